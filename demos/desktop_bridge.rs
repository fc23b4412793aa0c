//! Desktop bridge for trying the device against a real broker.
//!
//! Runs a dual relay board on mock hardware. A simulated relay board presses
//! button 0 every few seconds; commands published to
//! `sonoff/desktop/switch/<n>` drive the simulated relays.
//!
//! # Usage
//!
//! ```sh
//! cargo run --example desktop_bridge --features mqtt
//! MQTT_HOST=192.168.1.10 cargo run --example desktop_bridge --features mqtt
//! ```
//!
//! Watch the traffic with:
//!
//! ```sh
//! mosquitto_sub -t 'sonoff/desktop/#' -v
//! mosquitto_pub -t sonoff/desktop/switch/1 -m '{"state":"off"}'
//! ```

use std::thread;
use std::time::{Duration, Instant};

use relay_bridge::codec::relay::encode_relay_states;
use relay_bridge::hal::{MemoryStore, MockGpio, MockSerial};
use relay_bridge::services::RumqttClient;
use relay_bridge::traits::{Clock, Delay};
use relay_bridge::{
    Config, Device, DeviceConfig, MqttConfig, TickOutcome, Variant, VariantKind,
};
use tracing::info;

/// Main loop interval in milliseconds (50Hz = 20ms)
const LOOP_INTERVAL_MS: u64 = 20;

/// Time between simulated button presses.
const PRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Wall-clock time source.
struct SystemClock {
    start: Instant,
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Delay for SystemClock {
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "localhost".to_string());
    let config = Config::default()
        .with_mqtt(
            MqttConfig::default()
                .with_host(&host)
                .with_client_id("relay-bridge-desktop"),
        )
        .with_device(
            DeviceConfig::default()
                .with_hostname("desktop")
                .with_variant(VariantKind::Dual),
        );

    let mut store = MemoryStore::new();
    let variant: Variant<MockGpio, MockSerial> = Variant::dual(MockGpio::new(), MockSerial::new());
    let client = RumqttClient::new(&config.mqtt);
    let clock = SystemClock {
        start: Instant::now(),
    };
    let mut device = Device::new(variant, client, clock, &mut store, &config);

    info!("bridging dual board to {}", host);
    let mut last_press = Instant::now();
    let mut relays = 0u8;

    loop {
        if last_press.elapsed() >= PRESS_INTERVAL {
            last_press = Instant::now();
            // Button snapshots carry every channel, so flip bit 0 only
            let buttons = relays ^ 1;
            if let Some(serial) = device.variant_mut().primary_serial_mut() {
                serial.feed(&[0xA0, 0x00, buttons, 0xA1]);
            }
            relays = buttons;
        }

        if device.tick() == TickOutcome::Restart {
            info!("restart requested, exiting");
            return;
        }

        if let Some(serial) = device.variant_mut().primary_serial_mut() {
            let sent = serial.take_tx();
            if let Some(frame) = sent.chunks_exact(4).last() {
                relays = frame[2];
                info!("relay board <- {:04b}", relays);
                // The board echoes its relay state
                serial.feed(&encode_relay_states(relays));
            }
        }

        thread::sleep(Duration::from_millis(LOOP_INTERVAL_MS));
    }
}
