//! ESP32 hardware abstraction layer for relay and telemetry boards.
//!
//! # Hardware Configuration
//!
//! - **MCU**: any ESP32 running ESP-IDF
//! - **Single / Telemetry**: button, relay and status LED on GPIO
//! - **Dual**: relay board on UART0, status LED on GPIO
//! - **Telemetry**: meter on UART1 (receive only), heating controller on UART2
//!
//! # Pin Assignments
//!
//! See the [`pins`] module.

mod clock;
mod gpio;
mod uart;

pub use clock::Esp32Clock;
pub use gpio::Esp32Gpio;
pub use uart::Esp32Serial;

#[cfg(feature = "wifi")]
mod storage;
#[cfg(feature = "wifi")]
pub use storage::NvsStore;

#[cfg(feature = "wifi")]
mod wifi;
#[cfg(feature = "wifi")]
pub use wifi::Esp32Wifi;

#[cfg(feature = "esp32-mqtt")]
mod mqtt;
#[cfg(feature = "esp32-mqtt")]
pub use mqtt::{Esp32Mqtt, Esp32MqttError};

/// GPIO numbers used by the variant pin tables and the binary.
pub mod pins {
    // =========================================================================
    // Local IO
    // =========================================================================

    /// Push button (idles high, pulled low while pressed)
    pub const BUTTON: u8 = 0;

    /// Relay driver
    pub const RELAY: u8 = 12;

    /// Status LED (active low, PWM driven)
    pub const STATUS_LED: u8 = 13;

    // =========================================================================
    // Serial lines
    // =========================================================================

    /// Relay-board transmit (UART0)
    pub const RELAY_BOARD_TX: u8 = 1;

    /// Relay-board receive (UART0)
    pub const RELAY_BOARD_RX: u8 = 3;

    /// Meter data receive (UART1)
    pub const METER_RX: u8 = 26;

    /// Meter transmit (UART1, unused by the meter but required by the driver)
    pub const METER_TX: u8 = 27;

    /// Heating-controller transmit (UART2)
    pub const HEATING_TX: u8 = 17;

    /// Heating-controller receive (UART2)
    pub const HEATING_RX: u8 = 16;
}
