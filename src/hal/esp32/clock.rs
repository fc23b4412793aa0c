//! ESP32 clock and delay using the ESP-IDF timer and FreeRTOS.

use crate::traits::{Clock, Delay};
use esp_idf_hal::delay::FreeRtos;

/// ESP32 time source.
///
/// `now_ms` reads `esp_timer_get_time()` (microseconds since boot).
/// `delay_ms` yields to FreeRTOS, so the watchdog keeps being fed during the
/// heating controller's response wait.
///
/// # Example
///
/// ```ignore
/// use relay_bridge::hal::esp32::Esp32Clock;
/// use relay_bridge::traits::{Clock, Delay};
///
/// let mut clock = Esp32Clock::new();
/// let start = clock.now_ms();
/// clock.delay_ms(250);
/// assert!(clock.now_ms() - start >= 250);
/// ```
pub struct Esp32Clock;

impl Esp32Clock {
    /// Creates a new ESP32 clock instance.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Default for Esp32Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for Esp32Clock {
    #[inline]
    fn now_ms(&self) -> u64 {
        // Safe: plain read of the hardware timer
        let micros = unsafe { esp_idf_hal::sys::esp_timer_get_time() };
        (micros / 1000) as u64
    }
}

impl Delay for Esp32Clock {
    fn delay_ms(&mut self, ms: u32) {
        FreeRtos::delay_ms(ms);
    }
}
