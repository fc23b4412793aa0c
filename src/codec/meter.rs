//! Smart-meter telegram decoder.
//!
//! The meter pushes a telegram of CRLF-terminated ASCII lines every few
//! seconds:
//!
//! ```text
//! /ISk5\2MT382-1000                        <- start line
//!
//! 1-0:1.8.1(123456.789*kWh)                <- tariff 1
//! 1-0:1.8.2(002345.678*kWh)                <- tariff 2
//! 0-1:24.2.1(101209112500W)(12785.123*m3)  <- gas timestamp and volume
//! !E060                                    <- end line with checksum
//! ```
//!
//! The checksum is the reflected 0xA001 CRC over every byte from `/` up to
//! and including `!`. Fields are copied verbatim from fixed offsets of
//! matching lines; nothing leaves the decoder until the checksum matches.

use alloc::vec::Vec;
use heapless::{String, Vec as LineBuffer};
use tracing::{debug, warn};

use super::crc::crc16_reflected_update;
use super::ByteView;
use crate::error::CodecError;
use crate::traits::SerialPort;

/// Line speed of the meter port.
pub const METER_BAUD: u32 = 115_200;

const LINE_LEN: usize = 64;

/// Values of one telegram, copied verbatim from the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeterReading {
    /// Delivered energy, tariff 1 (`000000.000`, kWh).
    pub tariff1: String<10>,
    /// Delivered energy, tariff 2 (`000000.000`, kWh).
    pub tariff2: String<10>,
    /// Gas volume (`00000.000`, m3).
    pub gas: String<9>,
    /// Timestamp of the gas reading (`YYMMDDhhmmssX`).
    pub gas_timestamp: String<12>,
}

#[derive(Clone, Copy, Debug)]
enum Field {
    Tariff1,
    Tariff2,
    Gas,
    GasTimestamp,
}

struct FieldRule {
    prefix: &'static [u8],
    offset: usize,
    len: usize,
    field: Field,
}

const FIELD_RULES: [FieldRule; 4] = [
    FieldRule {
        prefix: b"1-0:1.8.1(",
        offset: 10,
        len: 10,
        field: Field::Tariff1,
    },
    FieldRule {
        prefix: b"1-0:1.8.2(",
        offset: 10,
        len: 10,
        field: Field::Tariff2,
    },
    FieldRule {
        prefix: b"0-1:24.2.1(",
        offset: 11,
        len: 12,
        field: Field::GasTimestamp,
    },
    FieldRule {
        prefix: b"0-1:24.2.1(",
        offset: 26,
        len: 9,
        field: Field::Gas,
    },
];

fn copy_field<const N: usize>(target: &mut String<N>, value: &str) {
    target.clear();
    // Rule lengths equal the field capacities, so this cannot overflow.
    let _ = target.push_str(value);
}

impl MeterReading {
    fn set(&mut self, field: Field, value: &str) {
        match field {
            Field::Tariff1 => copy_field(&mut self.tariff1, value),
            Field::Tariff2 => copy_field(&mut self.tariff2, value),
            Field::Gas => copy_field(&mut self.gas, value),
            Field::GasTimestamp => copy_field(&mut self.gas_timestamp, value),
        }
    }
}

/// Accumulator for the telegram currently being received.
#[derive(Clone, Debug, Default)]
pub struct MeterSession {
    reading: MeterReading,
    crc: u16,
    open: bool,
}

impl MeterSession {
    /// Start a fresh telegram, dropping anything collected so far.
    pub fn begin(&mut self) {
        self.reading = MeterReading::default();
        self.crc = 0;
        self.open = true;
    }

    /// Feed one byte into the running checksum.
    pub fn checksum(&mut self, byte: u8) {
        self.crc = crc16_reflected_update(self.crc, byte);
    }

    /// Running checksum so far.
    pub fn crc(&self) -> u16 {
        self.crc
    }

    /// True between a start line and the end line.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Values collected so far.
    pub fn reading(&self) -> &MeterReading {
        &self.reading
    }

    /// Close the telegram against the transmitted checksum.
    ///
    /// The accumulated reading is handed out only on a match and dropped
    /// in every case.
    pub fn finish(&mut self, expected: u16) -> Result<MeterReading, CodecError> {
        self.open = false;
        let reading = core::mem::take(&mut self.reading);
        if expected == self.crc {
            Ok(reading)
        } else {
            Err(CodecError::ChecksumMismatch {
                expected,
                computed: self.crc,
            })
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LineKind {
    Start,
    Data,
    End,
    Outside,
}

/// Streaming telegram decoder.
///
/// # Example
///
/// ```rust
/// use relay_bridge::codec::meter::MeterTelegramCodec;
///
/// let mut codec = MeterTelegramCodec::new();
/// let telegram = b"/XMX5\r\n1-0:1.8.1(000001.000*kWh)\r\n!0000\r\n";
/// let results = codec.push_bytes(telegram);
/// // Wrong checksum: the telegram is dropped whole.
/// assert!(results[0].is_err());
/// ```
#[derive(Debug, Default)]
pub struct MeterTelegramCodec {
    session: MeterSession,
    line: LineBuffer<u8, LINE_LEN>,
    kind: Option<LineKind>,
}

impl MeterTelegramCodec {
    /// Create a decoder waiting for a start line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current telegram accumulator.
    pub fn session(&self) -> &MeterSession {
        &self.session
    }

    /// Decode bytes, yielding one result per completed telegram.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<Result<MeterReading, CodecError>> {
        bytes.iter().filter_map(|&b| self.push_byte(b)).collect()
    }

    /// Drain the serial line, returning the telegrams that validated.
    ///
    /// Rejected telegrams are logged and dropped.
    pub fn receive<S: SerialPort + ?Sized>(&mut self, serial: &mut S) -> Vec<MeterReading> {
        let mut readings = Vec::new();
        while let Some(byte) = serial.read_byte() {
            match self.push_byte(byte) {
                Some(Ok(reading)) => readings.push(reading),
                Some(Err(e)) => warn!("meter: telegram discarded: {}", e),
                None => {}
            }
        }
        readings
    }

    /// Decode one byte. Returns a result when the byte closes a telegram.
    pub fn push_byte(&mut self, byte: u8) -> Option<Result<MeterReading, CodecError>> {
        let kind = match self.kind {
            Some(kind) => kind,
            None => {
                let kind = self.classify(byte);
                self.kind = Some(kind);
                kind
            }
        };

        match kind {
            LineKind::Start | LineKind::Data => self.session.checksum(byte),
            // Only the '!' itself is covered; the hex digits are not.
            LineKind::End if self.line.is_empty() => self.session.checksum(byte),
            _ => {}
        }

        // Lines longer than the buffer keep their head, which holds every
        // field offset.
        let _ = self.line.push(byte);

        if byte != b'\n' {
            return None;
        }
        let result = self.finish_line(kind);
        self.line.clear();
        self.kind = None;
        result
    }

    fn classify(&mut self, first: u8) -> LineKind {
        match first {
            b'/' => {
                if self.session.is_open() {
                    debug!("meter: start line inside a telegram, restarting");
                }
                self.session.begin();
                LineKind::Start
            }
            b'!' if self.session.is_open() => LineKind::End,
            _ if self.session.is_open() => LineKind::Data,
            _ => LineKind::Outside,
        }
    }

    fn finish_line(&mut self, kind: LineKind) -> Option<Result<MeterReading, CodecError>> {
        let view = ByteView::new(&self.line);
        match kind {
            LineKind::Data => {
                for rule in FIELD_RULES.iter().filter(|r| view.starts_with(r.prefix)) {
                    match view.str_at(rule.offset, rule.len) {
                        Ok(value) => self.session.reading.set(rule.field, value),
                        Err(e) => warn!("meter: short {:?} line: {}", rule.field, e),
                    }
                }
                None
            }
            LineKind::End => {
                let expected = view
                    .str_at(1, 4)
                    .map_err(|_| CodecError::BadChecksumField)
                    .and_then(|hex| {
                        u16::from_str_radix(hex, 16).map_err(|_| CodecError::BadChecksumField)
                    });
                Some(match expected {
                    Ok(expected) => self.session.finish(expected),
                    Err(e) => {
                        self.session.open = false;
                        Err(e)
                    }
                })
            }
            LineKind::Start | LineKind::Outside => None,
        }
    }
}
