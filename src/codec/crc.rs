//! CRC-16 variants used by the serial protocols.
//!
//! | Function | Protocol | Polynomial | Seed | Direction |
//! |----------|----------|------------|------|-----------|
//! | [`crc16_reflected`] | meter telegram | 0xA001 | 0x0000 | reflected, bitwise |
//! | [`crc16_table`] | heating controller | 0x1021 | 0xFFFF | MSB first, table |

/// Reflected polynomial used by the meter telegram checksum.
pub const METER_POLY: u16 = 0xA001;

/// Polynomial the heating-controller lookup table is built from.
pub const HEATING_POLY: u16 = 0x1021;

/// Seed of the heating-controller checksum.
pub const HEATING_SEED: u16 = 0xFFFF;

/// 256-entry lookup table for [`HEATING_POLY`], built at compile time.
pub const HEATING_TABLE: [u16; 256] = build_table(HEATING_POLY);

const fn build_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ poly
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Feed one byte into a running reflected 0xA001 checksum.
#[inline]
pub fn crc16_reflected_update(mut crc: u16, byte: u8) -> u16 {
    crc ^= byte as u16;
    for _ in 0..8 {
        crc = if crc & 1 != 0 {
            (crc >> 1) ^ METER_POLY
        } else {
            crc >> 1
        };
    }
    crc
}

/// Reflected 0xA001 checksum of `data`, seeded with zero.
pub fn crc16_reflected(data: &[u8]) -> u16 {
    data.iter().fold(0, |crc, &b| crc16_reflected_update(crc, b))
}

/// Feed one byte into a running table-driven checksum.
#[inline]
pub fn crc16_table_update(crc: u16, byte: u8) -> u16 {
    (crc << 8) ^ HEATING_TABLE[(((crc >> 8) as u8) ^ byte) as usize]
}

/// Table-driven checksum of `data`, seeded with [`HEATING_SEED`].
pub fn crc16_table(data: &[u8]) -> u16 {
    data.iter()
        .fold(HEATING_SEED, |crc, &b| crc16_table_update(crc, b))
}
