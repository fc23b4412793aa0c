//! Shared configuration for desktop and ESP32.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`. On hardware the values come from
//! the persisted settings blob through [`Settings::to_config`].
//!
//! # Example
//!
//! ```rust
//! use relay_bridge::config::{Config, DeviceConfig, MqttConfig, TopicKind};
//!
//! let config = Config::default()
//!     .with_mqtt(MqttConfig::default().with_host("192.168.1.100"))
//!     .with_device(DeviceConfig::default().with_hostname("hall"));
//!
//! let topic = config.mqtt.device_topic("hall", TopicKind::Input, 0);
//! assert_eq!(topic.as_str(), "sonoff/hall/input/0");
//! ```
//!
//! [`Settings::to_config`]: crate::settings::Settings::to_config

use core::fmt::Write;

use heapless::String as HString;
use tracing::warn;

use crate::codec::heating::{DEFAULT_QUERY_INTERVAL_MS, DEFAULT_RESPONSE_DELAY_MS, HEATING_BAUD};
use crate::codec::meter::METER_BAUD;
use crate::variant::VariantKind;

/// Maximum length for short config strings (hostnames, credentials)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer config strings (topics)
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

/// Default topic prefix, shared with the stock firmware.
pub const DEFAULT_TOPIC_PREFIX: &str = "sonoff";

/// Default hostname when none is configured.
pub const DEFAULT_HOSTNAME: &str = "relay-bridge";

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

/// Longest prefix of `s` that fits `max` bytes without splitting a character.
pub(crate) fn fitting_prefix(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let _ = hs.push_str(fitting_prefix(s, MAX_SHORT_STRING));
    hs
}

/// Create a LongString from a &str, truncating if too long
pub fn long_string(s: &str) -> LongString {
    let mut hs = LongString::new();
    let _ = hs.push_str(fitting_prefix(s, MAX_LONG_STRING));
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// WiFi connection configuration
    pub wifi: WifiConfig,
    /// MQTT client configuration
    pub mqtt: MqttConfig,
    /// Device identification and hardware variant
    pub device: DeviceConfig,
    /// Serial telemetry timing
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Set WiFi configuration
    pub fn with_wifi(mut self, wifi: WifiConfig) -> Self {
        self.wifi = wifi;
        self
    }

    /// Set MQTT configuration
    pub fn with_mqtt(mut self, mqtt: MqttConfig) -> Self {
        self.mqtt = mqtt;
        self
    }

    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Set telemetry configuration
    pub fn with_telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.telemetry = telemetry;
        self
    }
}

// ============================================================================
// Topics
// ============================================================================

/// Kind segment of a device topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopicKind {
    /// Input state changes.
    Input,
    /// Output state changes.
    Output,
    /// Output commands.
    Switch,
    /// Meter telegrams.
    Meter,
    /// Heating controller readings.
    Heating,
}

impl TopicKind {
    /// Topic segment for this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            TopicKind::Input => "input",
            TopicKind::Output => "output",
            TopicKind::Switch => "switch",
            TopicKind::Meter => "meter",
            TopicKind::Heating => "heating",
        }
    }
}

// ============================================================================
// MQTT Config
// ============================================================================

/// MQTT client configuration
#[derive(Clone, Debug)]
pub struct MqttConfig {
    /// Broker hostname or IP
    pub host: ShortString,
    /// Broker port
    pub port: u16,
    /// Client ID (should be unique per device)
    pub client_id: ShortString,
    /// First topic segment
    pub topic_prefix: ShortString,
    /// Username for authentication (empty = no auth)
    pub username: ShortString,
    /// Password for authentication
    pub password: ShortString,
    /// Broker certificate fingerprint (empty = plain TCP)
    pub fingerprint: ShortString,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Interval between explicit keepalive pings
    pub ping_interval_ms: u64,
    /// Longest wait for inbound commands per tick
    pub drain_wait_ms: u32,
    /// Whether MQTT is enabled
    pub enabled: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: short_string("localhost"),
            port: 1883,
            client_id: short_string(DEFAULT_HOSTNAME),
            topic_prefix: short_string(DEFAULT_TOPIC_PREFIX),
            username: ShortString::new(),
            password: ShortString::new(),
            fingerprint: ShortString::new(),
            keep_alive_secs: 300,
            ping_interval_ms: 180_000,
            drain_wait_ms: 100,
            enabled: true,
        }
    }
}

impl MqttConfig {
    /// Set the broker host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = short_string(host);
        self
    }

    /// Set the broker port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the client ID
    pub fn with_client_id(mut self, id: &str) -> Self {
        self.client_id = short_string(id);
        self
    }

    /// Set the topic prefix
    pub fn with_topic_prefix(mut self, prefix: &str) -> Self {
        self.topic_prefix = short_string(prefix);
        self
    }

    /// Set authentication credentials
    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.username = short_string(username);
        self.password = short_string(password);
        self
    }

    /// Set the broker certificate fingerprint
    pub fn with_fingerprint(mut self, fingerprint: &str) -> Self {
        self.fingerprint = short_string(fingerprint);
        self
    }

    /// Set the keepalive ping interval
    pub fn with_ping_interval_ms(mut self, ms: u64) -> Self {
        self.ping_interval_ms = ms;
        self
    }

    /// Set the per-tick command wait
    pub fn with_drain_wait_ms(mut self, ms: u32) -> Self {
        self.drain_wait_ms = ms;
        self
    }

    /// Enable or disable MQTT
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Build `<prefix>/<hostname>/<kind>/<index>`.
    pub fn device_topic(&self, hostname: &str, kind: TopicKind, index: usize) -> LongString {
        let mut topic = LongString::new();
        if write!(
            topic,
            "{}/{}/{}/{}",
            self.topic_prefix,
            hostname,
            kind.as_str(),
            index
        )
        .is_err()
        {
            warn!(
                "topic for {} {} on {} exceeds {} bytes, truncated to {}",
                kind.as_str(),
                index,
                hostname,
                MAX_LONG_STRING,
                topic
            );
        }
        topic
    }

    /// Check if authentication is configured
    pub fn has_auth(&self) -> bool {
        !self.username.is_empty()
    }

    /// Check if a broker is configured at all
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.host.is_empty()
    }
}

// ============================================================================
// WiFi Config
// ============================================================================

/// WiFi connection configuration
#[derive(Clone, Debug)]
pub struct WifiConfig {
    /// WiFi network SSID
    pub ssid: ShortString,
    /// WiFi pre-shared key
    pub password: ShortString,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u32,
    /// Whether WiFi is enabled
    pub enabled: bool,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: ShortString::new(),
            password: ShortString::new(),
            connect_timeout_ms: 30_000,
            enabled: true,
        }
    }
}

impl WifiConfig {
    /// Set the SSID
    pub fn with_ssid(mut self, ssid: &str) -> Self {
        self.ssid = short_string(ssid);
        self
    }

    /// Set the password
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = short_string(password);
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout_ms(mut self, ms: u32) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Enable or disable WiFi
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Check if WiFi credentials are configured
    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty()
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Device identification configuration
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Network hostname, also the second topic segment
    pub hostname: ShortString,
    /// Hardware variant the firmware drives
    pub variant: VariantKind,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            hostname: short_string(DEFAULT_HOSTNAME),
            variant: VariantKind::Single,
        }
    }
}

impl DeviceConfig {
    /// Set the hostname
    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = short_string(hostname);
        self
    }

    /// Set the hardware variant
    pub fn with_variant(mut self, variant: VariantKind) -> Self {
        self.variant = variant;
        self
    }
}

// ============================================================================
// Telemetry Config
// ============================================================================

/// Timing and line speeds of the serial telemetry channels
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Time between heating-controller queries
    pub heating_interval_ms: u64,
    /// Wait between heating query and response read
    pub heating_response_delay_ms: u32,
    /// Heating-controller line speed
    pub heating_baud: u32,
    /// Meter line speed
    pub meter_baud: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            heating_interval_ms: DEFAULT_QUERY_INTERVAL_MS,
            heating_response_delay_ms: DEFAULT_RESPONSE_DELAY_MS,
            heating_baud: HEATING_BAUD,
            meter_baud: METER_BAUD,
        }
    }
}

impl TelemetryConfig {
    /// Set the heating query interval
    pub fn with_heating_interval_ms(mut self, ms: u64) -> Self {
        self.heating_interval_ms = ms;
        self
    }

    /// Set the heating response delay
    pub fn with_heating_response_delay_ms(mut self, ms: u32) -> Self {
        self.heating_response_delay_ms = ms;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
