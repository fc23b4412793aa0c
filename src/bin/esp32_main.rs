//! ESP32 relay-board firmware.
//!
//! This is the main entry point for the physical hardware. It:
//! - Restores settings from NVS (defaults on first boot)
//! - Joins WiFi unless the device still needs setup
//! - Builds the board variant selected at compile time
//! - Runs the device tick loop at 50 Hz
//! - Restarts the chip when a reset trigger asks for it
//!
//! # Build
//!
//! ```bash
//! # Single relay board (default)
//! cargo build --release --features esp32-mqtt
//!
//! # Dual relay board or telemetry board
//! DEVICE_VARIANT=dual cargo build --release --features esp32-mqtt
//! DEVICE_VARIANT=telemetry cargo build --release --features esp32-mqtt
//! ```

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::prelude::*;
use esp_idf_hal::uart::{config::Config as UartConfig, UartDriver};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use relay_bridge::hal::esp32::{
    pins, Esp32Clock, Esp32Gpio, Esp32Mqtt, Esp32Serial, Esp32Wifi, NvsStore,
};
use relay_bridge::{Device, Settings, TickOutcome, Variant, VariantKind};
use tracing::{info, warn};

/// Main loop interval in milliseconds (50Hz = 20ms)
const LOOP_INTERVAL_MS: u32 = 20;

/// Grace period before restarting so the last log lines get out.
const RESTART_DELAY_MS: u32 = 100;

fn main() -> anyhow::Result<()> {
    esp_idf_hal::sys::link_patches();

    let kind = option_env!("DEVICE_VARIANT")
        .and_then(VariantKind::from_name)
        .unwrap_or(VariantKind::Single);

    // The dual relay board owns the console UART
    if kind.serial_logging_allowed() {
        EspLogger::initialize_default();
    }
    info!("relay-bridge starting on {} board", kind.name());

    // =========================================================================
    // Settings
    // =========================================================================
    let nvs = EspDefaultNvsPartition::take()?;
    let mut store = NvsStore::new(nvs.clone())?;
    let settings = Settings::restore(&mut store)?;
    let setup_mode = settings.setup_required();

    let mut config = settings.to_config();
    config.device.variant = kind;

    let peripherals = Peripherals::take()?;

    // =========================================================================
    // WiFi
    // =========================================================================
    let _wifi = if setup_mode {
        warn!("setup required, staying offline");
        None
    } else if !config.wifi.is_configured() {
        warn!("wifi not configured");
        None
    } else {
        let sysloop = EspSystemEventLoop::take()?;
        Some(Esp32Wifi::new(
            peripherals.modem,
            sysloop,
            Some(nvs),
            config.device.hostname.as_str(),
            &config.wifi,
        )?)
    };

    // =========================================================================
    // Board
    // =========================================================================
    let gpio = Esp32Gpio::new().with_indicator(
        pins::STATUS_LED,
        peripherals.pins.gpio13,
        peripherals.ledc.timer0,
        peripherals.ledc.channel0,
    )?;

    let uart_config = UartConfig::default().baudrate(Hertz(115_200));
    let variant: Variant<Esp32Gpio, Esp32Serial> = match kind {
        VariantKind::Single => Variant::single(gpio),
        VariantKind::Dual => {
            let uart = UartDriver::new(
                peripherals.uart0,
                peripherals.pins.gpio1,
                peripherals.pins.gpio3,
                Option::<AnyIOPin>::None,
                Option::<AnyIOPin>::None,
                &uart_config,
            )?;
            Variant::dual(gpio, Esp32Serial::new(uart))
        }
        VariantKind::Telemetry => {
            let meter = UartDriver::new(
                peripherals.uart1,
                peripherals.pins.gpio27,
                peripherals.pins.gpio26,
                Option::<AnyIOPin>::None,
                Option::<AnyIOPin>::None,
                &uart_config,
            )?;
            let heating = UartDriver::new(
                peripherals.uart2,
                peripherals.pins.gpio17,
                peripherals.pins.gpio16,
                Option::<AnyIOPin>::None,
                Option::<AnyIOPin>::None,
                &uart_config,
            )?;
            Variant::telemetry(
                gpio,
                Esp32Serial::new(meter),
                Esp32Serial::new(heating),
                &config.telemetry,
            )
        }
    };

    // =========================================================================
    // Device
    // =========================================================================
    let client = Esp32Mqtt::new(&config.mqtt);
    let offline = setup_mode || !config.mqtt.is_configured();
    let mut device = Device::new(variant, client, Esp32Clock::new(), &mut store, &config);
    device.set_setup_mode(offline);

    info!("entering main loop");
    loop {
        if device.tick() == TickOutcome::Restart {
            info!("restarting");
            FreeRtos::delay_ms(RESTART_DELAY_MS);
            esp_idf_hal::reset::restart();
        }
        FreeRtos::delay_ms(LOOP_INTERVAL_MS);
    }
}
