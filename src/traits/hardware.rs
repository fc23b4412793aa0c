//! Hardware abstraction traits for GPIO, serial lines and timing.
//!
//! This module defines the hardware interfaces that allow relay-bridge to
//! run on the ESP32 as well as against desktop mocks.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`Gpio`] | Digital pins and PWM indicator outputs |
//! | [`SerialPort`] | Byte-oriented serial line used by the protocol codecs |
//! | [`Clock`] | Monotonic millisecond time source |
//! | [`Delay`] | Blocking delay used by half-duplex queries |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. For ESP32 hardware, use the
//! implementations from `hal::esp32` (requires `esp32` feature).
//!
//! # Example
//!
//! ```rust
//! use relay_bridge::traits::{Gpio, PinMode};
//! use relay_bridge::hal::MockGpio;
//!
//! let mut gpio = MockGpio::new();
//! gpio.configure(12, PinMode::Output);
//! gpio.write(12, true);
//! assert!(gpio.read(12));
//! ```

/// Full-scale duty cycle for indicator PWM outputs.
///
/// A duty of `0` keeps an active-low LED fully lit, `PWM_RANGE` keeps it dark.
pub const PWM_RANGE: u32 = 1023;

/// Direction of a GPIO line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinMode {
    /// Line is sampled.
    Input,
    /// Line is driven.
    Output,
}

/// Digital pin access addressed by physical pin number.
///
/// Pins are addressed by number rather than by typed handle because the
/// pin tables of a device variant are declared as plain numbers.
///
/// # Implementation Notes
///
/// - `read` of an output pin returns the level last driven
/// - `write_duty` is only called for indicator pins; values range
///   from `0` to [`PWM_RANGE`]
pub trait Gpio {
    /// Configure the direction of a pin.
    fn configure(&mut self, pin: u8, mode: PinMode);

    /// Read the current level of a pin.
    fn read(&mut self, pin: u8) -> bool;

    /// Drive a pin high or low.
    fn write(&mut self, pin: u8, high: bool);

    /// Drive a PWM duty cycle (0..=[`PWM_RANGE`]) on an indicator pin.
    fn write_duty(&mut self, pin: u8, duty: u32);
}

/// Byte-oriented serial line.
///
/// The protocol codecs only ever need to know how many bytes are
/// waiting, pull single bytes and push whole frames.
pub trait SerialPort {
    /// Reconfigure the line speed.
    fn set_baud_rate(&mut self, baud: u32);

    /// Number of received bytes waiting to be read.
    fn available(&self) -> usize;

    /// Read one byte, `None` if nothing is waiting.
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue bytes for transmission.
    fn write_all(&mut self, bytes: &[u8]);

    /// Discard everything currently waiting in the receive buffer.
    ///
    /// Returns the number of discarded bytes.
    fn discard_input(&mut self) -> usize {
        let mut count = 0;
        while self.read_byte().is_some() {
            count += 1;
        }
        count
    }
}

/// Time source trait for `no_std` compatibility.
///
/// Provides monotonic time in milliseconds for dwell-time measurement
/// and fixed-interval scheduling.
///
/// # Example
///
/// ```rust
/// use relay_bridge::traits::Clock;
/// use relay_bridge::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}

/// Blocking delay.
///
/// The heating-controller query holds the whole tick while it waits for
/// the response.
pub trait Delay {
    /// Block for the specified number of milliseconds.
    fn delay_ms(&mut self, ms: u32);
}
