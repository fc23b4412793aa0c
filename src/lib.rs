//! # relay-bridge
//!
//! Firmware core for WiFi switch and relay boards that bridges their local
//! IO, serial peripherals and an MQTT broker.
//!
//! ## Features
//!
//! - **Uniform IO**: inputs and outputs read the same whether they are GPIO
//!   lines or bits proxied by a serial relay board
//! - **Dwell-time triggers**: each input transition fires at most one of four
//!   actions, chosen by how long the previous state lasted
//! - **Serial codecs**: relay-board frames, meter telegrams and
//!   heating-controller queries, all checksum validated
//! - **Broker bridge**: publish state changes as JSON, apply commands from
//!   per-output switch topics, keepalive and setup mode
//! - **Persisted settings**: fixed-layout blob with defaults and reset
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware and network abstractions
//! - `codec` - Serial wire formats
//! - `io` / `trigger` - Pin tables and transition classification
//! - `variant` - Supported boards behind one capability interface
//! - `bridge` - Broker connection, publish and command drain
//! - `device` - Tick loop that ties everything together
//! - `hal` - Concrete implementations (mock for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use relay_bridge::{
//!     Config, Device, TickOutcome, Variant,
//!     hal::{MemoryStore, MockClock, MockGpio, MockMqtt, MockSerial},
//! };
//!
//! let mut store = MemoryStore::new();
//! let mut gpio = MockGpio::new();
//! gpio.set_level(0, true); // button idles high
//! let variant: Variant<MockGpio, MockSerial> = Variant::single(gpio);
//! let mut device = Device::new(
//!     variant,
//!     MockMqtt::new(),
//!     MockClock::new(),
//!     &mut store,
//!     &Config::default(),
//! );
//!
//! // Press the button for 200 ms: the relay toggles on release.
//! device.variant_mut().gpio_mut().set_level(0, false);
//! device.tick();
//! device.clock_mut().advance(200);
//! device.variant_mut().gpio_mut().set_level(0, true);
//! assert_eq!(device.tick(), TickOutcome::Continue);
//! assert!(device.variant().gpio().level(12));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Broker connection, publishing and command drain.
pub mod bridge;
/// Relay-board, meter-telegram and heating-controller wire formats.
pub mod codec;
/// Shared configuration system for desktop and ESP32.
pub mod config;
/// Device state and the main tick loop.
pub mod device;
/// Error types.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Input, output and indicator pin tables.
pub mod io;
/// JSON payloads published and received over MQTT.
pub mod messages;
/// Persisted settings blob.
pub mod settings;
/// Core traits for hardware and network abstraction.
pub mod traits;
/// Input transition classification and trigger actions.
pub mod trigger;
/// Supported hardware variants.
pub mod variant;

/// Desktop network services (feature-gated).
#[cfg(feature = "mqtt")]
pub mod services;

// Re-exports for convenience
pub use bridge::{Drained, LinkStatus, NetworkBridge};
pub use codec::{HeatingReading, MeterReading, RelayFrame};
pub use device::{Device, TickOutcome};
pub use error::{BridgeError, CodecError, SettingsError};
pub use io::{IndicatorPin, InputPin, IoRegistry, OutputPin};
pub use settings::{SettingKey, Settings, SettingsStore};
pub use traits::{
    // Hardware
    Clock,
    Delay,
    Gpio,
    // Network
    MqttClient,
    MqttMessage,
    PinMode,
    SerialPort,
};
pub use trigger::{DwellBucket, OutputControl, PublishTrigger, TriggerAction};
pub use variant::{Board, BoardEvent, Variant, VariantKind};

// Config re-exports
pub use config::{Config, DeviceConfig, MqttConfig, TelemetryConfig, TopicKind, WifiConfig};
