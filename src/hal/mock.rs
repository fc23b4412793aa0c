//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for all hardware, network and storage
//! traits, enabling development and testing on desktop without physical
//! hardware. Every mock keeps its state in public fields so tests can both
//! inject stimuli and inspect effects.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockGpio`] | [`Gpio`] | Pin levels, modes and PWM duty |
//! | [`MockSerial`] | [`SerialPort`] | Receive queue, transmit log, canned replies |
//! | [`MockClock`] | [`Clock`], [`Delay`] | Controllable time source; delays advance it |
//! | [`MockMqtt`] | [`MqttClient`] | Captures connect/pub/sub operations |
//! | [`MemoryStore`] | [`SettingsStore`] | Settings blob in memory |
//!
//! # Example
//!
//! ```rust
//! use relay_bridge::hal::{MockClock, MockSerial};
//! use relay_bridge::traits::{Delay, SerialPort};
//!
//! let mut serial = MockSerial::new();
//! serial.reply_with(&[0x02, 0x03]);
//! serial.write_all(&[0x01]);
//! assert_eq!(serial.available(), 2);
//!
//! let mut clock = MockClock::new();
//! clock.delay_ms(250);
//! assert_eq!(clock.total_delay_ms, 250);
//! ```
//!
//! [`Gpio`]: crate::traits::Gpio
//! [`SerialPort`]: crate::traits::SerialPort
//! [`Clock`]: crate::traits::Clock
//! [`Delay`]: crate::traits::Delay
//! [`MqttClient`]: crate::traits::MqttClient
//! [`SettingsStore`]: crate::settings::SettingsStore

extern crate alloc;
use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::SettingsError;
use crate::settings::SettingsStore;
use crate::traits::{Clock, Delay, Gpio, MqttClient, MqttMessage, PinMode, SerialPort};

// ============================================================================
// Hardware Mocks
// ============================================================================

/// Number of pins the mock GPIO bank exposes.
pub const MOCK_PIN_COUNT: usize = 40;

/// Mock GPIO bank.
///
/// Reads return the stored level, writes store it. Pins outside the bank
/// read low and ignore writes.
///
/// # Example
///
/// ```rust
/// use relay_bridge::hal::MockGpio;
/// use relay_bridge::traits::Gpio;
///
/// let mut gpio = MockGpio::new();
/// gpio.set_level(0, true);
/// assert!(gpio.read(0));
///
/// gpio.write_duty(13, 750);
/// assert_eq!(gpio.duty[13], Some(750));
/// ```
#[derive(Debug, Clone)]
pub struct MockGpio {
    /// Current level of every pin.
    pub levels: [bool; MOCK_PIN_COUNT],
    /// Configured direction, `None` until configured.
    pub modes: [Option<PinMode>; MOCK_PIN_COUNT],
    /// Last PWM duty written, `None` if never driven.
    pub duty: [Option<u32>; MOCK_PIN_COUNT],
    /// Number of `write` calls.
    pub writes: usize,
}

impl MockGpio {
    /// Creates a bank with every pin low and unconfigured.
    pub fn new() -> Self {
        Self {
            levels: [false; MOCK_PIN_COUNT],
            modes: [None; MOCK_PIN_COUNT],
            duty: [None; MOCK_PIN_COUNT],
            writes: 0,
        }
    }

    /// Simulate an external level on `pin`.
    pub fn set_level(&mut self, pin: u8, high: bool) {
        if let Some(level) = self.levels.get_mut(usize::from(pin)) {
            *level = high;
        }
    }

    /// Level of `pin`.
    pub fn level(&self, pin: u8) -> bool {
        self.levels.get(usize::from(pin)).copied().unwrap_or(false)
    }
}

impl Default for MockGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl Gpio for MockGpio {
    fn configure(&mut self, pin: u8, mode: PinMode) {
        if let Some(slot) = self.modes.get_mut(usize::from(pin)) {
            *slot = Some(mode);
        }
    }

    fn read(&mut self, pin: u8) -> bool {
        self.level(pin)
    }

    fn write(&mut self, pin: u8, high: bool) {
        self.writes += 1;
        self.set_level(pin, high);
    }

    fn write_duty(&mut self, pin: u8, duty: u32) {
        if let Some(slot) = self.duty.get_mut(usize::from(pin)) {
            *slot = Some(duty);
        }
    }
}

/// Mock serial line.
///
/// Bytes in `rx` are what the remote side sent. Everything written lands
/// in `tx`. A canned `reply` is moved into `rx` on every write, which models
/// a half-duplex peer answering a query.
#[derive(Debug, Default, Clone)]
pub struct MockSerial {
    /// Bytes waiting to be read.
    pub rx: VecDeque<u8>,
    /// Bytes written so far.
    pub tx: Vec<u8>,
    /// Current line speed, 0 until configured.
    pub baud: u32,
    /// Reply queued into `rx` on every write.
    pub reply: Option<Vec<u8>>,
}

impl MockSerial {
    /// Creates an idle line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make bytes available for reading.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Answer every write with `bytes`.
    pub fn reply_with(&mut self, bytes: &[u8]) {
        self.reply = Some(bytes.to_vec());
    }

    /// Take everything written so far.
    pub fn take_tx(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.tx)
    }
}

impl SerialPort for MockSerial {
    fn set_baud_rate(&mut self, baud: u32) {
        self.baud = baud;
    }

    fn available(&self) -> usize {
        self.rx.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn write_all(&mut self, bytes: &[u8]) {
        self.tx.extend_from_slice(bytes);
        if let Some(reply) = &self.reply {
            self.rx.extend(reply.iter().copied());
        }
    }
}

/// Mock clock for testing time-dependent behavior.
///
/// Allows manual control of time progression. Delays advance the clock
/// instead of sleeping, so blocking waits are visible in tests.
///
/// # Example
///
/// ```rust
/// use relay_bridge::hal::MockClock;
/// use relay_bridge::traits::Clock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.set(1000);
/// assert_eq!(clock.now_ms(), 1000);
///
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
    /// Sum of all delays requested.
    pub total_delay_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

impl Delay for MockClock {
    fn delay_ms(&mut self, ms: u32) {
        self.total_delay_ms += u64::from(ms);
        self.current_ms += u64::from(ms);
    }
}

// ============================================================================
// Network Mocks
// ============================================================================

/// Mock MQTT client for testing.
///
/// Records all connect/publish/subscribe operations and allows injecting
/// incoming messages and failures.
///
/// # Example
///
/// ```rust
/// use relay_bridge::hal::MockMqtt;
/// use relay_bridge::traits::MqttClient;
///
/// let mut mqtt = MockMqtt::new();
/// assert!(!mqtt.is_connected());
/// mqtt.connect().unwrap();
///
/// mqtt.queue_message("sonoff/hall/switch/0", r#"{"state":"on"}"#);
/// assert!(mqtt.try_recv().is_some());
///
/// mqtt.publish("sonoff/hall/input/0", b"{}", false).unwrap();
/// assert_eq!(mqtt.published_to("sonoff/hall/input/0").len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockMqtt {
    /// Messages that have been published (topic, payload, retain).
    pub published: Vec<(String, Vec<u8>, bool)>,
    /// Topics that have been subscribed to.
    pub subscriptions: Vec<String>,
    /// Queue of incoming messages to be returned by `try_recv()`.
    pub incoming: VecDeque<MqttMessage>,
    /// Whether the client is connected.
    pub connected: bool,
    /// Make `connect` fail.
    pub fail_connect: bool,
    /// Make `publish` fail.
    pub fail_publish: bool,
    /// Number of `connect` calls.
    pub connect_attempts: usize,
    /// Number of `disconnect` calls.
    pub disconnects: usize,
    /// Number of publish attempts, failed ones included.
    pub publish_attempts: usize,
    /// Number of `ping` calls.
    pub pings: usize,
}

impl MockMqtt {
    /// Creates a new mock MQTT client in disconnected state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an incoming message
    pub fn queue_message(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.incoming.push_back(MqttMessage::new(topic, payload));
    }

    /// Check if a topic was subscribed to
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.iter().any(|t| t == topic)
    }

    /// Get published messages for a topic
    pub fn published_to(&self, topic: &str) -> Vec<&(String, Vec<u8>, bool)> {
        self.published
            .iter()
            .filter(|(t, _, _)| t == topic)
            .collect()
    }
}

impl MqttClient for MockMqtt {
    type Error = &'static str;

    fn connect(&mut self) -> Result<(), Self::Error> {
        self.connect_attempts += 1;
        if self.fail_connect {
            return Err("connection refused");
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        self.publish_attempts += 1;
        if self.fail_publish {
            return Err("publish rejected");
        }
        if !self.connected {
            return Err("not connected");
        }
        self.published.push((topic.into(), payload.to_vec(), retain));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        if !self.connected {
            return Err("not connected");
        }
        self.subscriptions.push(topic.into());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        self.incoming.pop_front()
    }

    fn ping(&mut self) -> Result<(), Self::Error> {
        self.pings += 1;
        Ok(())
    }
}

// ============================================================================
// Storage Mocks
// ============================================================================

/// Settings store backed by memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    /// Stored blob, `None` if never saved.
    pub blob: Option<Vec<u8>>,
    /// Number of successful saves.
    pub saves: usize,
    /// Make `save` fail.
    pub fail_save: bool,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store already holding `blob`.
    pub fn with_blob(blob: Vec<u8>) -> Self {
        Self {
            blob: Some(blob),
            ..Self::default()
        }
    }
}

impl SettingsStore for MemoryStore {
    fn load(&mut self) -> Result<Option<Vec<u8>>, SettingsError> {
        Ok(self.blob.clone())
    }

    fn save(&mut self, blob: &[u8]) -> Result<(), SettingsError> {
        if self.fail_save {
            return Err(SettingsError::Storage("write protected".into()));
        }
        self.blob = Some(blob.to_vec());
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // MockGpio Tests
    // =========================================================================

    #[test]
    fn mock_gpio_default() {
        let mut gpio = MockGpio::new();
        assert!(!gpio.read(0));
        assert_eq!(gpio.modes[12], None);
        assert_eq!(gpio.duty[13], None);
    }

    #[test]
    fn mock_gpio_write_read() {
        let mut gpio = MockGpio::new();
        gpio.configure(12, PinMode::Output);
        gpio.write(12, true);
        assert!(gpio.read(12));
        assert_eq!(gpio.modes[12], Some(PinMode::Output));
        assert_eq!(gpio.writes, 1);
    }

    #[test]
    fn mock_gpio_out_of_range_pin() {
        let mut gpio = MockGpio::new();
        gpio.write(200, true);
        gpio.configure(200, PinMode::Input);
        gpio.write_duty(200, 5);
        assert!(!gpio.read(200));
    }

    // =========================================================================
    // MockSerial Tests
    // =========================================================================

    #[test]
    fn mock_serial_feed_and_read() {
        let mut serial = MockSerial::new();
        serial.feed(&[1, 2]);
        assert_eq!(serial.available(), 2);
        assert_eq!(serial.read_byte(), Some(1));
        assert_eq!(serial.read_byte(), Some(2));
        assert_eq!(serial.read_byte(), None);
    }

    #[test]
    fn mock_serial_reply_on_write() {
        let mut serial = MockSerial::new();
        serial.reply_with(&[9]);
        serial.write_all(&[1, 2, 3]);
        serial.write_all(&[4]);
        assert_eq!(serial.take_tx(), [1, 2, 3, 4]);
        assert!(serial.tx.is_empty());
        assert_eq!(serial.available(), 2);
    }

    // =========================================================================
    // MockClock Tests
    // =========================================================================

    #[test]
    fn mock_clock_default() {
        let clock = MockClock::new();
        assert_eq!(clock.now_ms(), 0);
    }

    #[test]
    fn mock_clock_advance() {
        let mut clock = MockClock::new();
        clock.advance(500);
        assert_eq!(clock.now_ms(), 500);
        clock.advance(250);
        assert_eq!(clock.now_ms(), 750);
    }

    #[test]
    fn mock_clock_delay_advances_time() {
        let mut clock = MockClock::new();
        clock.set(1_000);
        clock.delay_ms(250);
        assert_eq!(clock.now_ms(), 1_250);
        assert_eq!(clock.total_delay_ms, 250);
    }

    // =========================================================================
    // MockMqtt Tests
    // =========================================================================

    #[test]
    fn mock_mqtt_connect_lifecycle() {
        let mut mqtt = MockMqtt::new();
        assert!(!mqtt.is_connected());
        mqtt.connect().unwrap();
        assert!(mqtt.is_connected());
        mqtt.disconnect();
        assert!(!mqtt.is_connected());
        assert_eq!(mqtt.connect_attempts, 1);
        assert_eq!(mqtt.disconnects, 1);
    }

    #[test]
    fn mock_mqtt_failures() {
        let mut mqtt = MockMqtt::new();
        mqtt.fail_connect = true;
        assert!(mqtt.connect().is_err());
        assert!(mqtt.publish("t", b"x", false).is_err());
        assert!(mqtt.subscribe("t").is_err());
        assert_eq!(mqtt.publish_attempts, 1);
    }

    #[test]
    fn mock_mqtt_fifo_incoming() {
        let mut mqtt = MockMqtt::new();
        mqtt.queue_message("a", "1");
        mqtt.queue_message("b", "2");
        assert_eq!(mqtt.try_recv().map(|m| m.topic), Some("a".into()));
        assert_eq!(mqtt.recv_timeout(100).map(|m| m.topic), Some("b".into()));
        assert!(mqtt.try_recv().is_none());
    }

    #[test]
    fn mock_mqtt_records_publishes() {
        let mut mqtt = MockMqtt::new();
        mqtt.connect().unwrap();
        mqtt.publish("a", b"1", false).unwrap();
        mqtt.publish("b", b"2", true).unwrap();
        mqtt.publish("a", b"3", false).unwrap();
        assert_eq!(mqtt.published_to("a").len(), 2);
        assert!(mqtt.published_to("b")[0].2);
    }

    // =========================================================================
    // MemoryStore Tests
    // =========================================================================

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load(), Ok(None));
        store.save(&[1, 2, 3]).unwrap();
        assert_eq!(store.load(), Ok(Some(alloc::vec![1, 2, 3])));
        assert_eq!(store.saves, 1);
    }

    #[test]
    fn memory_store_failure() {
        let mut store = MemoryStore::new();
        store.fail_save = true;
        assert!(store.save(&[1]).is_err());
        assert!(store.blob.is_none());
    }
}
