//! Numbered GPIO access and LEDC indicator PWM.
//!
//! Pin tables address lines by number, which the typed `esp-idf-hal` pin
//! drivers cannot do, so levels and directions go through the raw ESP-IDF
//! GPIO calls. Indicator PWM uses one LEDC channel per indicator pin.

use crate::traits::{Gpio, PinMode, PWM_RANGE};
use esp_idf_hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::prelude::*;
use esp_idf_hal::sys::{
    gpio_get_level, gpio_mode_t_GPIO_MODE_INPUT, gpio_mode_t_GPIO_MODE_INPUT_OUTPUT,
    gpio_reset_pin, gpio_set_direction, gpio_set_level, EspError,
};
use tracing::warn;

/// Indicator PWM frequency in Hz.
const INDICATOR_FREQ_HZ: u32 = 1_000;

/// Numbered GPIO bank.
///
/// # Example
///
/// ```ignore
/// use relay_bridge::hal::esp32::Esp32Gpio;
///
/// let peripherals = Peripherals::take()?;
/// let gpio = Esp32Gpio::new().with_indicator(
///     13,
///     peripherals.pins.gpio13,
///     peripherals.ledc.timer0,
///     peripherals.ledc.channel0,
/// )?;
/// ```
pub struct Esp32Gpio<'d> {
    indicators: Vec<(u8, LedcDriver<'d>)>,
}

impl<'d> Esp32Gpio<'d> {
    /// Bank without indicator channels.
    pub fn new() -> Self {
        Self {
            indicators: Vec::new(),
        }
    }

    /// Attach an LEDC channel driving indicator `pin`.
    ///
    /// The channel runs at 10-bit resolution so duties map 1:1 onto
    /// [`PWM_RANGE`].
    ///
    /// # Errors
    ///
    /// Returns an error if the timer or channel cannot be configured.
    pub fn with_indicator<T, TI, C, CI, P, PI>(
        mut self,
        pin: u8,
        output: P,
        timer: T,
        channel: C,
    ) -> Result<Self, EspError>
    where
        TI: esp_idf_hal::ledc::LedcTimer + 'd,
        T: Peripheral<P = TI> + 'd,
        CI: esp_idf_hal::ledc::LedcChannel<SpeedMode = TI::SpeedMode> + 'd,
        C: Peripheral<P = CI> + 'd,
        PI: esp_idf_hal::gpio::OutputPin + 'd,
        P: Peripheral<P = PI> + 'd,
    {
        let timer_config = TimerConfig::default()
            .frequency(INDICATOR_FREQ_HZ.Hz())
            .resolution(Resolution::Bits10);
        let timer_driver = LedcTimerDriver::new(timer, &timer_config)?;
        let mut driver = LedcDriver::new(channel, timer_driver, output)?;
        driver.set_duty(PWM_RANGE)?;
        self.indicators.push((pin, driver));
        Ok(self)
    }
}

impl Default for Esp32Gpio<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Gpio for Esp32Gpio<'_> {
    fn configure(&mut self, pin: u8, mode: PinMode) {
        // Outputs stay readable so toggles can read back the relay state
        let mode = match mode {
            PinMode::Input => gpio_mode_t_GPIO_MODE_INPUT,
            PinMode::Output => gpio_mode_t_GPIO_MODE_INPUT_OUTPUT,
        };
        // Safe: pin numbers come from the fixed variant tables
        let result = unsafe {
            gpio_reset_pin(i32::from(pin));
            gpio_set_direction(i32::from(pin), mode)
        };
        if let Err(e) = EspError::convert(result) {
            warn!("gpio {}: configure failed: {}", pin, e);
        }
    }

    fn read(&mut self, pin: u8) -> bool {
        // Safe: read-only register access
        unsafe { gpio_get_level(i32::from(pin)) != 0 }
    }

    fn write(&mut self, pin: u8, high: bool) {
        // Safe: pin was configured as output by the device
        let result = unsafe { gpio_set_level(i32::from(pin), u32::from(high)) };
        if let Err(e) = EspError::convert(result) {
            warn!("gpio {}: write failed: {}", pin, e);
        }
    }

    fn write_duty(&mut self, pin: u8, duty: u32) {
        let Some((_, driver)) = self.indicators.iter_mut().find(|(p, _)| *p == pin) else {
            warn!("gpio {}: no PWM channel", pin);
            return;
        };
        if let Err(e) = driver.set_duty(duty.min(PWM_RANGE)) {
            warn!("gpio {}: duty failed: {}", pin, e);
        }
    }
}
