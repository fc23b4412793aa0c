//! JSON payloads exchanged with the broker.
//!
//! These types are `no_std` compatible and are encoded and decoded with
//! `serde-json-core` into fixed-capacity buffers.
//!
//! # Example
//!
//! ```
//! use relay_bridge::messages::{encode_bool_event, parse_switch_command};
//!
//! let payload = encode_bool_event(true, true, 1200).unwrap();
//! assert_eq!(
//!     payload.as_str(),
//!     r#"{"type":"bool","value":true,"state":"on","deltaTime":1200}"#
//! );
//!
//! let cmd = parse_switch_command(br#"{"state": "off"}"#).unwrap();
//! assert_eq!(cmd.value(), Some(true));
//! ```

use serde::{Deserialize, Serialize};

use crate::codec::{HeatingReading, MeterReading};
use crate::error::BridgeError;

/// Capacity of an encoded payload.
pub const PAYLOAD_LEN: usize = 128;

/// Encoded payload buffer.
pub type Payload = heapless::String<PAYLOAD_LEN>;

// ============================================================================
// Outbound events
// ============================================================================

/// State change of an input or output.
///
/// # JSON Example
///
/// ```json
/// {"type":"bool","value":false,"state":"off","deltaTime":740}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoolEvent {
    /// Always `"bool"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Raw pin level.
    pub value: bool,
    /// `"on"` or `"off"`, after report inversion.
    pub state: &'static str,
    /// Time the previous level lasted, zero for outputs.
    #[serde(rename = "deltaTime")]
    pub delta_time: u64,
}

impl BoolEvent {
    /// Build an event for `value`, reported as `state`.
    pub fn new(value: bool, state: bool, delta_time: u64) -> Self {
        Self {
            kind: "bool",
            value,
            state: if state { "on" } else { "off" },
            delta_time,
        }
    }
}

/// One validated meter telegram.
///
/// # JSON Example
///
/// ```json
/// {"type":"meter","tariff1":"123456.789","tariff2":"002345.678",
///  "gas":"12785.123","gasTimestamp":"101209112500"}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeterEvent<'a> {
    /// Always `"meter"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Delivered energy, tariff 1.
    pub tariff1: &'a str,
    /// Delivered energy, tariff 2.
    pub tariff2: &'a str,
    /// Gas volume.
    pub gas: &'a str,
    /// Gas reading timestamp.
    #[serde(rename = "gasTimestamp")]
    pub gas_timestamp: &'a str,
}

impl<'a> From<&'a MeterReading> for MeterEvent<'a> {
    fn from(reading: &'a MeterReading) -> Self {
        Self {
            kind: "meter",
            tariff1: &reading.tariff1,
            tariff2: &reading.tariff2,
            gas: &reading.gas,
            gas_timestamp: &reading.gas_timestamp,
        }
    }
}

/// One heating-controller reading in °C.
///
/// # JSON Example
///
/// ```json
/// {"type":"heating","temperature":21.5,"setpoint":20.0}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatingEvent {
    /// Always `"heating"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Room temperature.
    pub temperature: f32,
    /// Active setpoint.
    pub setpoint: f32,
}

impl From<&HeatingReading> for HeatingEvent {
    fn from(reading: &HeatingReading) -> Self {
        Self {
            kind: "heating",
            temperature: reading.temperature_celsius(),
            setpoint: reading.setpoint_celsius(),
        }
    }
}

// ============================================================================
// Inbound commands
// ============================================================================

/// Command received on a switch topic.
///
/// # JSON Example
///
/// ```json
/// {"state": "on"}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SwitchCommand<'a> {
    /// Requested state, matched case-insensitively.
    #[serde(borrow, default)]
    pub state: Option<&'a str>,
}

impl SwitchCommand<'_> {
    /// Output value this command asks for, `None` without a `state` field.
    pub fn value(&self) -> Option<bool> {
        self.state.map(command_value)
    }
}

/// Map a command `state` to an output value.
///
/// `"false"` and `"off"` drive the output to `true`; anything else drives
/// it to `false`. Existing relay installations depend on this mapping.
pub fn command_value(state: &str) -> bool {
    state.eq_ignore_ascii_case("false") || state.eq_ignore_ascii_case("off")
}

// ============================================================================
// Encoding and parsing (serde-json-core)
// ============================================================================

fn encode<T: Serialize>(event: &T) -> Result<Payload, BridgeError> {
    serde_json_core::to_string::<_, PAYLOAD_LEN>(event).map_err(|_| BridgeError::Encode)
}

/// Encode a pin state change.
pub fn encode_bool_event(value: bool, state: bool, delta_time: u64) -> Result<Payload, BridgeError> {
    encode(&BoolEvent::new(value, state, delta_time))
}

/// Encode a meter telegram.
pub fn encode_meter_event(reading: &MeterReading) -> Result<Payload, BridgeError> {
    encode(&MeterEvent::from(reading))
}

/// Encode a heating-controller reading.
pub fn encode_heating_event(reading: &HeatingReading) -> Result<Payload, BridgeError> {
    encode(&HeatingEvent::from(reading))
}

/// Parse a switch command. `None` if the payload is not a JSON object.
pub fn parse_switch_command(json: &[u8]) -> Option<SwitchCommand<'_>> {
    serde_json_core::from_slice(json).ok().map(|(cmd, _)| cmd)
}
