//! Serial wire protocols.
//!
//! Three codecs share the same building blocks: a [`ByteView`] for
//! fixed-offset access and the CRC routines in [`crc`].
//!
//! | Codec | Transport | Framing | Integrity |
//! |-------|-----------|---------|-----------|
//! | [`relay`] | console UART, 19 200 baud | 4 byte frames | start/end markers |
//! | [`meter`] | dedicated UART, 115 200 baud | CRLF ASCII lines | CRC16 0xA001 reflected |
//! | [`heating`] | dedicated UART, 9 600 baud | 8 byte query, 64 byte response | CRC16 0x1021 table |

pub mod crc;
pub mod heating;
pub mod meter;
pub mod relay;
mod view;

pub use heating::{HeatingController, HeatingReading};
pub use meter::{MeterReading, MeterSession, MeterTelegramCodec};
pub use relay::{RelayBoardCodec, RelayFrame};
pub use view::ByteView;
