//! Network services for desktop builds.
//!
//! - `mqtt` feature: [`RumqttClient`], an [`MqttClient`](crate::traits::MqttClient)
//!   over the synchronous `rumqttc` API, so a device running on mock
//!   hardware can talk to a real broker.

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "mqtt")]
pub use mqtt::*;
