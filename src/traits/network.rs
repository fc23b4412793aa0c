//! Network abstraction trait for the MQTT broker connection.
//!
//! The device owns exactly one broker connection. Everything it publishes and
//! every command it accepts flows through an implementation of [`MqttClient`]:
//!
//! ```text
//! sonoff/<host>/input/<i>      - Input state changes (published)
//! sonoff/<host>/output/<i>     - Output state changes (published)
//! sonoff/<host>/switch/<i>     - Output commands (subscribed)
//! sonoff/<host>/meter/0        - Meter telegram readings (published)
//! sonoff/<host>/heating/0      - Heating controller readings (published)
//! ```

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

// ============================================================================
// MQTT Client Trait (Sync-First Design)
// ============================================================================

/// MQTT client trait for pub/sub messaging.
///
/// This trait uses a **sync-first design** that works on both ESP32 (blocking I/O)
/// and desktop. The device drives it from a single cooperative tick, so no
/// method may block longer than the bounded waits it is given.
///
/// # Implementation Notes
///
/// - `connect` performs one connection attempt; reconnection is driven by
///   the caller on its next tick
/// - `publish` and `subscribe` are synchronous (blocking on ESP32)
/// - `try_recv` is non-blocking; `recv_timeout` waits at most `timeout_ms`
///
/// # Example
///
/// ```rust,ignore
/// use relay_bridge::traits::MqttClient;
///
/// fn announce<M: MqttClient>(client: &mut M) {
///     client.publish("sonoff/hall/status", b"online", true).unwrap();
/// }
/// ```
pub trait MqttClient {
    /// Error type for MQTT operations.
    type Error: core::fmt::Debug;

    /// Attempt to establish the broker session (blocking).
    fn connect(&mut self) -> Result<(), Self::Error>;

    /// Tear down any (partial) session state.
    fn disconnect(&mut self);

    /// Check if connected to broker.
    fn is_connected(&self) -> bool;

    /// Publish a message to a topic (blocking).
    ///
    /// # Arguments
    /// - `topic`: MQTT topic path
    /// - `payload`: Message bytes
    /// - `retain`: If true, broker keeps message for new subscribers
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error>;

    /// Subscribe to a topic (blocking).
    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Try to receive the next message (non-blocking).
    ///
    /// Returns `None` if no message is available. This should never block.
    fn try_recv(&mut self) -> Option<MqttMessage>;

    /// Receive the next message, waiting at most `timeout_ms`.
    ///
    /// The default implementation does not wait.
    fn recv_timeout(&mut self, timeout_ms: u32) -> Option<MqttMessage> {
        let _ = timeout_ms;
        self.try_recv()
    }

    /// Send a keepalive ping.
    ///
    /// Clients whose transport keeps the session alive on its own can rely
    /// on the default no-op.
    fn ping(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// An MQTT message received from a subscription.
///
/// Contains the topic and payload of a published message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttMessage {
    /// Topic the message was published to.
    pub topic: String,
    /// Message payload as raw bytes.
    pub payload: Vec<u8>,
}

impl MqttMessage {
    /// Create a new MQTT message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Returns the payload as a UTF-8 string, if valid.
    pub fn payload_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.payload).ok()
    }
}
