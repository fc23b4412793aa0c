//! Relay-board serial protocol.
//!
//! The dual relay board talks to the controller over the console UART,
//! reconfigured to [`RELAY_BAUD`]. Every message is exactly four bytes:
//!
//! ```text
//! +------+-----+------+------+
//! | 0xA0 | CMD | DATA | 0xA1 |
//! +------+-----+------+------+
//! ```
//!
//! | CMD | Meaning | DATA |
//! |-----|---------|------|
//! | `0x00` | button snapshot | bit `i` = logical index `i` |
//! | `0x04` | relay status echo | bit `i` = logical index `i` |
//! | `0xF5` | button stuck | ignored |
//! | `0xF6` | button released after stuck | ignored |
//!
//! The controller only ever sends `0x04` frames carrying the desired relay
//! bitmask.

use alloc::vec::Vec;
use heapless::Vec as FrameBuffer;
use tracing::{debug, warn};

use super::ByteView;
use crate::error::CodecError;
use crate::traits::SerialPort;

/// Line speed of the relay-board link.
pub const RELAY_BAUD: u32 = 19_200;

/// First byte of every frame.
pub const FRAME_START: u8 = 0xA0;

/// Last byte of every frame.
pub const FRAME_END: u8 = 0xA1;

/// Length of every frame.
pub const FRAME_LEN: usize = 4;

/// Button snapshot command.
pub const CMD_BUTTONS: u8 = 0x00;

/// Relay status command, both directions.
pub const CMD_RELAYS: u8 = 0x04;

/// Stuck button event.
pub const CMD_STUCK: u8 = 0xF5;

/// Stuck button released.
pub const CMD_UNSTUCK: u8 = 0xF6;

const BUFFER_LEN: usize = 16;

/// A validated relay-board frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayFrame {
    /// Button snapshot or relay echo: bit `i` is the state of index `i`.
    States(u8),
    /// A button has been held down past the board's stuck threshold.
    Stuck,
    /// The stuck button was released.
    Unstuck,
}

impl RelayFrame {
    /// Validate one complete frame.
    ///
    /// Every field is checked before a value is returned, so a frame with a
    /// bad end marker never yields pin states.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < FRAME_LEN {
            return Err(CodecError::Incomplete {
                needed: FRAME_LEN,
                available: bytes.len(),
            });
        }
        let view = ByteView::new(bytes);

        let start = view.u8_at(0)?;
        if start != FRAME_START {
            return Err(CodecError::BadStart(start));
        }

        let data = view.u8_at(2)?;
        let frame = match view.u8_at(1)? {
            CMD_BUTTONS | CMD_RELAYS => RelayFrame::States(data),
            CMD_STUCK => RelayFrame::Stuck,
            CMD_UNSTUCK => RelayFrame::Unstuck,
            other => return Err(CodecError::UnknownCommand(other)),
        };

        let end = view.u8_at(3)?;
        if end != FRAME_END {
            return Err(CodecError::BadEnd(end));
        }
        Ok(frame)
    }
}

/// Build the relay status frame for `mask`.
///
/// # Example
///
/// ```rust
/// use relay_bridge::codec::relay::{encode_relay_states, RelayFrame};
///
/// let frame = encode_relay_states(0b1101);
/// assert_eq!(frame, [0xA0, 0x04, 0b1101, 0xA1]);
/// assert_eq!(RelayFrame::decode(&frame), Ok(RelayFrame::States(0b1101)));
/// ```
pub const fn encode_relay_states(mask: u8) -> [u8; FRAME_LEN] {
    [FRAME_START, CMD_RELAYS, mask, FRAME_END]
}

/// Fold per-index states into a bitmask, bit `i` for index `i`.
///
/// Only the first eight states fit the DATA byte; the rest are ignored.
pub fn states_to_mask<I>(states: I) -> u8
where
    I: IntoIterator<Item = bool>,
{
    states
        .into_iter()
        .take(8)
        .enumerate()
        .fold(0u8, |mask, (i, on)| if on { mask | (1 << i) } else { mask })
}

/// Incremental frame decoder over a serial byte stream.
///
/// Bytes are buffered until a full frame is present, so a frame split
/// across two reads is still decoded. Bytes that cannot start a frame are
/// skipped.
#[derive(Debug, Default)]
pub struct RelayBoardCodec {
    buffer: FrameBuffer<u8, BUFFER_LEN>,
}

impl RelayBoardCodec {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Append received bytes and return every frame they complete.
    ///
    /// Invalid frames are logged and dropped whole.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<RelayFrame> {
        let mut frames = Vec::new();
        for &byte in bytes {
            self.push_byte(byte, &mut frames);
        }
        frames
    }

    /// Drain everything the serial line holds and decode it.
    pub fn receive<S: SerialPort + ?Sized>(&mut self, serial: &mut S) -> Vec<RelayFrame> {
        let mut frames = Vec::new();
        while let Some(byte) = serial.read_byte() {
            self.push_byte(byte, &mut frames);
        }
        frames
    }

    fn push_byte(&mut self, byte: u8, frames: &mut Vec<RelayFrame>) {
        if self.buffer.is_empty() && byte != FRAME_START {
            warn!("relay board: skipping 0x{:02x} outside a frame", byte);
            return;
        }
        if self.buffer.push(byte).is_err() {
            // Unreachable while frames are consumed as soon as they complete.
            self.buffer.clear();
            return;
        }
        if self.buffer.len() < FRAME_LEN {
            return;
        }

        match RelayFrame::decode(&self.buffer) {
            Ok(frame) => {
                debug!("relay board: {:?}", frame);
                frames.push(frame);
            }
            Err(e) => warn!("relay board: dropping frame {:02x?}: {}", &self.buffer[..], e),
        }
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_button_snapshot() {
        assert_eq!(
            RelayFrame::decode(&[0xA0, 0x00, 0b0101, 0xA1]),
            Ok(RelayFrame::States(0b0101))
        );
    }

    #[test]
    fn decode_stuck_events_ignore_data() {
        assert_eq!(RelayFrame::decode(&[0xA0, 0xF5, 0x77, 0xA1]), Ok(RelayFrame::Stuck));
        assert_eq!(RelayFrame::decode(&[0xA0, 0xF6, 0x00, 0xA1]), Ok(RelayFrame::Unstuck));
    }

    #[test]
    fn decode_rejects_unknown_command() {
        assert_eq!(
            RelayFrame::decode(&[0xA0, 0x3C, 0x00, 0xA1]),
            Err(CodecError::UnknownCommand(0x3C))
        );
    }

    #[test]
    fn decode_rejects_bad_end_before_applying_data() {
        assert_eq!(
            RelayFrame::decode(&[0xA0, 0x04, 0x0F, 0xA2]),
            Err(CodecError::BadEnd(0xA2))
        );
    }

    #[test]
    fn decode_short_frame() {
        assert_eq!(
            RelayFrame::decode(&[0xA0, 0x04]),
            Err(CodecError::Incomplete {
                needed: 4,
                available: 2
            })
        );
    }

    #[test]
    fn mask_from_states() {
        assert_eq!(states_to_mask([true, false, true, true]), 0b1101);
        assert_eq!(states_to_mask([false; 4]), 0);
        assert_eq!(states_to_mask([true; 10]), 0xFF);
    }

    #[test]
    fn split_frame_is_reassembled() {
        let mut codec = RelayBoardCodec::new();
        assert!(codec.push_bytes(&[0xA0, 0x00]).is_empty());
        assert_eq!(codec.pending(), 2);
        assert_eq!(codec.push_bytes(&[0x03, 0xA1]), [RelayFrame::States(3)]);
        assert_eq!(codec.pending(), 0);
    }

    #[test]
    fn leading_noise_is_skipped() {
        let mut codec = RelayBoardCodec::new();
        let frames = codec.push_bytes(&[0x00, 0x13, 0xA0, 0x04, 0x01, 0xA1]);
        assert_eq!(frames, [RelayFrame::States(1)]);
    }

    #[test]
    fn several_frames_in_one_read() {
        let mut codec = RelayBoardCodec::new();
        let frames = codec.push_bytes(&[
            0xA0, 0x00, 0x01, 0xA1, //
            0xA0, 0xF5, 0x00, 0xA1, //
            0xA0, 0x04, 0x02, 0xA1,
        ]);
        assert_eq!(
            frames,
            [RelayFrame::States(1), RelayFrame::Stuck, RelayFrame::States(2)]
        );
    }
}
