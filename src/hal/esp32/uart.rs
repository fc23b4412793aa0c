//! UART serial lines for the relay board and telemetry peripherals.

use crate::traits::SerialPort;
use esp_idf_hal::delay::{NON_BLOCK, TickType};
use esp_idf_hal::prelude::*;
use esp_idf_hal::uart::UartDriver;
use tracing::warn;

/// Longest wait for a single outgoing chunk.
const WRITE_TIMEOUT_MS: u64 = 100;

/// Serial line over an ESP-IDF UART driver.
///
/// Reads never block: the device only consumes what already arrived.
///
/// # Example
///
/// ```ignore
/// use esp_idf_hal::uart::{config::Config, UartDriver};
/// use relay_bridge::hal::esp32::Esp32Serial;
///
/// let peripherals = Peripherals::take()?;
/// let uart = UartDriver::new(
///     peripherals.uart1,
///     peripherals.pins.gpio21,
///     peripherals.pins.gpio20,
///     Option::<AnyIOPin>::None,
///     Option::<AnyIOPin>::None,
///     &Config::default(),
/// )?;
/// let serial = Esp32Serial::new(uart);
/// ```
pub struct Esp32Serial<'d> {
    uart: UartDriver<'d>,
}

impl<'d> Esp32Serial<'d> {
    /// Wrap a configured UART driver.
    pub fn new(uart: UartDriver<'d>) -> Self {
        Self { uart }
    }

    /// The underlying driver.
    pub fn driver(&self) -> &UartDriver<'d> {
        &self.uart
    }
}

impl SerialPort for Esp32Serial<'_> {
    fn set_baud_rate(&mut self, baud: u32) {
        if let Err(e) = self.uart.change_baudrate(baud.Hz()) {
            warn!("uart: baud change to {} failed: {}", baud, e);
        }
    }

    fn available(&self) -> usize {
        self.uart.remaining_read().unwrap_or(0)
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.uart.read(&mut byte, NON_BLOCK) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn write_all(&mut self, bytes: &[u8]) {
        let mut rest = bytes;
        while !rest.is_empty() {
            match self.uart.write(rest) {
                Ok(0) => {
                    warn!("uart: write stalled, {} byte(s) dropped", rest.len());
                    return;
                }
                Ok(n) => rest = &rest[n..],
                Err(e) => {
                    warn!("uart: write failed: {}", e);
                    return;
                }
            }
        }
        let timeout = TickType::new_millis(WRITE_TIMEOUT_MS).ticks();
        if let Err(e) = self.uart.wait_tx_done(timeout) {
            warn!("uart: transmit not drained: {}", e);
        }
    }
}
