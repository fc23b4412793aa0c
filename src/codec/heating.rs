//! Heating-controller query/response protocol.
//!
//! The controller is polled over a half-duplex line. Each poll writes
//! [`QUERY`], waits a fixed delay and reads a 64 byte response:
//!
//! | Offset | Content |
//! |--------|---------|
//! | 0 | sync byte `0x02` |
//! | 1..62 | payload, covered by the checksum |
//! | 21..23 | room temperature, signed big endian, 1/100 °C |
//! | 27..29 | setpoint, signed big endian, 1/100 °C |
//! | 62 | high byte of the table CRC over 1..62 |
//! | 63 | trailer |

use tracing::{debug, warn};

use super::crc::crc16_table;
use super::ByteView;
use crate::error::CodecError;
use crate::traits::{Delay, SerialPort};

/// Line speed of the heating-controller port.
pub const HEATING_BAUD: u32 = 9_600;

/// Fixed status query.
pub const QUERY: [u8; 8] = [0x02, 0xFE, 0x01, 0x05, 0x08, 0x02, 0x01, 0x03];

/// Response length including the sync byte.
pub const RESPONSE_LEN: usize = 64;

/// First byte of every response.
pub const SYNC: u8 = 0x02;

/// Default time between two queries.
pub const DEFAULT_QUERY_INTERVAL_MS: u64 = 30_000;

/// Default wait between query and response read.
pub const DEFAULT_RESPONSE_DELAY_MS: u32 = 250;

const PAYLOAD_START: usize = 1;
const PAYLOAD_END: usize = 62;
const CRC_OFFSET: usize = 62;
const TEMPERATURE_OFFSET: usize = 21;
const SETPOINT_OFFSET: usize = 27;

/// Values of one validated response, in hundredths of a degree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeatingReading {
    /// Measured room temperature.
    pub temperature: i16,
    /// Active setpoint.
    pub setpoint: i16,
}

impl HeatingReading {
    /// Room temperature in °C.
    pub fn temperature_celsius(&self) -> f32 {
        f32::from(self.temperature) / 100.0
    }

    /// Setpoint in °C.
    pub fn setpoint_celsius(&self) -> f32 {
        f32::from(self.setpoint) / 100.0
    }
}

/// Validate a complete response frame and extract its values.
pub fn decode_response(frame: &[u8]) -> Result<HeatingReading, CodecError> {
    if frame.len() < RESPONSE_LEN {
        return Err(CodecError::Incomplete {
            needed: RESPONSE_LEN,
            available: frame.len(),
        });
    }
    let view = ByteView::new(frame);

    let sync = view.u8_at(0)?;
    if sync != SYNC {
        return Err(CodecError::BadStart(sync));
    }

    let computed = crc16_table(view.slice(PAYLOAD_START, PAYLOAD_END - PAYLOAD_START)?) >> 8;
    let expected = u16::from(view.u8_at(CRC_OFFSET)?);
    if computed != expected {
        return Err(CodecError::ChecksumMismatch { expected, computed });
    }

    Ok(HeatingReading {
        temperature: view.i16_be_at(TEMPERATURE_OFFSET)?,
        setpoint: view.i16_be_at(SETPOINT_OFFSET)?,
    })
}

/// Poll schedule and last result of the heating controller.
#[derive(Debug)]
pub struct HeatingController {
    last_query_ms: u64,
    interval_ms: u64,
    response_delay_ms: u32,
    last_reading: Option<HeatingReading>,
}

impl Default for HeatingController {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_INTERVAL_MS, DEFAULT_RESPONSE_DELAY_MS)
    }
}

impl HeatingController {
    /// Create a poller. The first query is due once `interval_ms` has passed.
    pub fn new(interval_ms: u64, response_delay_ms: u32) -> Self {
        Self {
            last_query_ms: 0,
            interval_ms,
            response_delay_ms,
            last_reading: None,
        }
    }

    /// Time between queries.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Last successfully decoded values.
    pub fn last_reading(&self) -> Option<HeatingReading> {
        self.last_reading
    }

    /// True when a query should be sent at `now_ms`.
    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_query_ms) >= self.interval_ms
    }

    /// Query the controller if the interval has elapsed.
    ///
    /// Blocks for the response delay. Failures are logged and yield `None`;
    /// the next interval simply tries again.
    pub fn poll<S, D>(&mut self, serial: &mut S, delay: &mut D, now_ms: u64) -> Option<HeatingReading>
    where
        S: SerialPort + ?Sized,
        D: Delay + ?Sized,
    {
        if !self.is_due(now_ms) {
            return None;
        }
        self.last_query_ms = now_ms;

        let stale = serial.discard_input();
        if stale > 0 {
            debug!("heating: discarded {} stale byte(s)", stale);
        }
        serial.write_all(&QUERY);
        delay.delay_ms(self.response_delay_ms);

        match read_response(serial) {
            Ok(reading) => {
                debug!(
                    "heating: temperature {} setpoint {}",
                    reading.temperature, reading.setpoint
                );
                self.last_reading = Some(reading);
                Some(reading)
            }
            Err(e) => {
                warn!("heating: response rejected: {}", e);
                None
            }
        }
    }
}

/// Skip to the sync byte, then read and decode the rest of the response.
fn read_response<S: SerialPort + ?Sized>(serial: &mut S) -> Result<HeatingReading, CodecError> {
    loop {
        match serial.read_byte() {
            Some(SYNC) => break,
            Some(_) => continue,
            None => return Err(CodecError::NoSync),
        }
    }

    let mut frame = [0u8; RESPONSE_LEN];
    frame[0] = SYNC;
    for (i, slot) in frame.iter_mut().enumerate().skip(1) {
        *slot = serial.read_byte().ok_or(CodecError::Incomplete {
            needed: RESPONSE_LEN,
            available: i,
        })?;
    }
    decode_response(&frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> [u8; RESPONSE_LEN] {
        let mut frame = [0u8; RESPONSE_LEN];
        frame[0] = SYNC;
        for (i, b) in frame.iter_mut().enumerate().take(62).skip(1) {
            *b = (i * 7) as u8;
        }
        frame[21] = 0x08;
        frame[22] = 0x66;
        frame[27] = 0x07;
        frame[28] = 0xD0;
        frame[62] = 0x17;
        frame[63] = 0x03;
        frame
    }

    #[test]
    fn decodes_known_frame() {
        let reading = decode_response(&response()).unwrap();
        assert_eq!(reading.temperature, 2150);
        assert_eq!(reading.setpoint, 2000);
        assert_eq!(reading.temperature_celsius(), 21.5);
        assert_eq!(reading.setpoint_celsius(), 20.0);
    }

    #[test]
    fn crc_high_byte_is_checked() {
        let mut frame = response();
        frame[62] = 0x18;
        assert_eq!(
            decode_response(&frame),
            Err(CodecError::ChecksumMismatch {
                expected: 0x18,
                computed: 0x17
            })
        );
    }

    #[test]
    fn bytes_outside_crc_range_are_not_covered() {
        let mut frame = response();
        frame[63] = 0xEE;
        assert!(decode_response(&frame).is_ok());
    }

    #[test]
    fn negative_temperature() {
        let reading = HeatingReading {
            temperature: -250,
            setpoint: 500,
        };
        assert_eq!(reading.temperature_celsius(), -2.5);
    }

    #[test]
    fn short_frame_is_incomplete() {
        assert_eq!(
            decode_response(&[SYNC; 10]),
            Err(CodecError::Incomplete {
                needed: 64,
                available: 10
            })
        );
    }

    #[test]
    fn schedule() {
        let heating = HeatingController::new(30_000, 250);
        assert!(!heating.is_due(0));
        assert!(!heating.is_due(29_999));
        assert!(heating.is_due(30_000));
    }
}
