//! Error types for the codecs, the network bridge and settings storage.
//!
//! None of these ever escape the device tick: they are logged, reflected in
//! the health indicator and the next cycle retries on its own.

use alloc::string::String;
use thiserror::Error;

/// Wire-protocol decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A fixed-offset read fell outside the received bytes.
    #[error("read of {len} byte(s) at offset {offset} exceeds {available} available")]
    OutOfRange {
        /// Requested offset.
        offset: usize,
        /// Requested length.
        len: usize,
        /// Bytes actually present.
        available: usize,
    },

    /// Frame did not begin with the expected start marker.
    #[error("unexpected start marker 0x{0:02x}")]
    BadStart(u8),

    /// Frame carried an unknown command byte.
    #[error("unexpected command 0x{0:02x}")]
    UnknownCommand(u8),

    /// Frame did not end with the expected end marker.
    #[error("unexpected end marker 0x{0:02x}")]
    BadEnd(u8),

    /// Fewer bytes arrived than the frame requires.
    #[error("incomplete frame: needed {needed} byte(s), got {available}")]
    Incomplete {
        /// Bytes required.
        needed: usize,
        /// Bytes received.
        available: usize,
    },

    /// No sync byte was found in the response.
    #[error("no sync byte in response")]
    NoSync,

    /// Computed and transmitted checksums differ.
    #[error("checksum mismatch: expected 0x{expected:04x}, computed 0x{computed:04x}")]
    ChecksumMismatch {
        /// Checksum carried by the wire data.
        expected: u16,
        /// Checksum computed over the received bytes.
        computed: u16,
    },

    /// The transmitted checksum field could not be parsed.
    #[error("malformed checksum field")]
    BadChecksumField,
}

/// Broker bridge failures.
///
/// Client errors are carried as their debug rendering so the bridge stays
/// independent of the client implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Connection attempt failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// A single publish call failed.
    #[error("publish to {topic} failed: {reason}")]
    Publish {
        /// Destination topic.
        topic: String,
        /// Client error.
        reason: String,
    },

    /// Subscribing to a command topic failed.
    #[error("subscribe to {topic} failed: {reason}")]
    Subscribe {
        /// Command topic.
        topic: String,
        /// Client error.
        reason: String,
    },

    /// Payload did not fit the encode buffer.
    #[error("payload encoding failed")]
    Encode,
}

/// Settings blob failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// Stored blob does not match the layout length.
    #[error("settings blob is {actual} byte(s), layout needs {expected}")]
    Length {
        /// Layout length.
        expected: usize,
        /// Stored length.
        actual: usize,
    },

    /// Storage backend reported an error.
    #[error("settings storage failed: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn codec_error_messages_show_hex_bytes() {
        assert_eq!(
            CodecError::UnknownCommand(0x3c).to_string(),
            "unexpected command 0x3c"
        );
        assert_eq!(CodecError::BadEnd(0xff).to_string(), "unexpected end marker 0xff");
        assert_eq!(
            CodecError::ChecksumMismatch {
                expected: 0xe060,
                computed: 0x1234
            }
            .to_string(),
            "checksum mismatch: expected 0xe060, computed 0x1234"
        );
    }

    #[test]
    fn bridge_error_names_topic() {
        let err = BridgeError::Publish {
            topic: "sonoff/hall/input/0".into(),
            reason: "NotConnected".into(),
        };
        assert_eq!(
            err.to_string(),
            "publish to sonoff/hall/input/0 failed: NotConnected"
        );
    }

    #[test]
    fn settings_length_error() {
        let err = SettingsError::Length {
            expected: 321,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "settings blob is 12 byte(s), layout needs 321"
        );
    }
}
