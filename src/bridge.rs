//! Broker connection owned by the device.
//!
//! The bridge gates all network activity on two things: whether the client
//! is connected and whether the device is in setup mode. It never retries on
//! its own; the device calls [`NetworkBridge::connect`] once per tick and a
//! failed attempt is simply repeated on the next one.
//!
//! ```text
//!            connect() ok                     tick
//!  ┌──────────┐ ───────────▶ ┌─────────────┐ ─────▶ ┌───────┐
//!  │ offline  │              │ established │        │ ready │──┐ publish / drain
//!  └──────────┘ ◀─────────── └─────────────┘        └───────┘◀─┘ keepalive
//!        ▲        connect() err                         │
//!        └──────────────────────────────────────────────┘ link lost
//! ```

use alloc::format;
use alloc::vec::Vec;

use tracing::{debug, error, info, warn};

use crate::config::{LongString, MqttConfig};
use crate::error::BridgeError;
use crate::messages::parse_switch_command;
use crate::traits::MqttClient;

/// Result of a connection check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkStatus {
    /// Already connected; network work may proceed.
    Ready,
    /// Setup mode; nothing touches the network.
    Suppressed,
    /// A connection attempt just succeeded. Commands are drained from the
    /// next tick on.
    Established,
}

impl LinkStatus {
    /// True when publish and drain may run in this tick.
    pub fn is_ready(self) -> bool {
        matches!(self, LinkStatus::Ready)
    }
}

/// Commands collected by one drain cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Drained {
    /// `(output index, value)` in arrival order.
    pub commands: Vec<(usize, bool)>,
    /// Messages received on registered topics, valid or not.
    pub received: usize,
}

/// Broker connection with its subscriptions and keepalive schedule.
pub struct NetworkBridge<C: MqttClient> {
    client: C,
    setup_mode: bool,
    subscriptions: Vec<(LongString, usize)>,
    ping_interval_ms: u64,
    drain_wait_ms: u32,
    last_ping_ms: u64,
}

impl<C: MqttClient> NetworkBridge<C> {
    /// Wrap `client`, taking timing from `config`.
    pub fn new(client: C, config: &MqttConfig) -> Self {
        Self {
            client,
            setup_mode: false,
            subscriptions: Vec::new(),
            ping_interval_ms: config.ping_interval_ms,
            drain_wait_ms: config.drain_wait_ms,
            last_ping_ms: 0,
        }
    }

    /// Underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Underlying client, mutably.
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// True while setup mode suppresses network activity.
    pub fn is_setup_mode(&self) -> bool {
        self.setup_mode
    }

    /// Enter or leave setup mode.
    pub fn set_setup_mode(&mut self, setup_mode: bool) {
        self.setup_mode = setup_mode;
    }

    /// True when the client reports an open session.
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Registered command topics and the output each one drives.
    pub fn subscriptions(&self) -> &[(LongString, usize)] {
        &self.subscriptions
    }

    /// Register a command topic for output `index`.
    ///
    /// Registered topics are subscribed on every successful connect.
    pub fn register_subscription(&mut self, topic: LongString, index: usize) {
        self.subscriptions.push((topic, index));
    }

    /// Make sure the broker session is up.
    ///
    /// Connected clients and setup mode return immediately without network
    /// access. Otherwise one attempt is made; a failed attempt tears the
    /// partial session down and is reported as an error.
    pub fn connect(&mut self, now_ms: u64) -> Result<LinkStatus, BridgeError> {
        if self.setup_mode {
            return Ok(LinkStatus::Suppressed);
        }
        if self.client.is_connected() {
            return Ok(LinkStatus::Ready);
        }

        info!("connecting to broker");
        match self.client.connect() {
            Ok(()) => {
                info!("broker connected");
                self.last_ping_ms = now_ms;
                self.resubscribe();
                Ok(LinkStatus::Established)
            }
            Err(e) => {
                let err = BridgeError::Connect(format!("{:?}", e));
                error!("{}", err);
                self.client.disconnect();
                Err(err)
            }
        }
    }

    fn resubscribe(&mut self) {
        for (topic, _) in &self.subscriptions {
            if let Err(e) = self.client.subscribe(topic) {
                let err = BridgeError::Subscribe {
                    topic: topic.as_str().into(),
                    reason: format!("{:?}", e),
                };
                warn!("{}", err);
            }
        }
    }

    /// Send a keepalive ping if the interval has elapsed.
    pub fn keepalive(&mut self, now_ms: u64) {
        if self.setup_mode || !self.client.is_connected() {
            return;
        }
        if now_ms.saturating_sub(self.last_ping_ms) < self.ping_interval_ms {
            return;
        }
        self.last_ping_ms = now_ms;
        match self.client.ping() {
            Ok(()) => debug!("broker ping"),
            Err(e) => warn!("broker ping failed: {:?}", e),
        }
    }

    /// Publish one payload. Exactly one attempt is made.
    ///
    /// In setup mode the call is skipped and reported as success.
    pub fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BridgeError> {
        if self.setup_mode {
            return Ok(());
        }
        debug!("publish {} {}", topic, payload);
        self.client
            .publish(topic, payload.as_bytes(), false)
            .map_err(|e| BridgeError::Publish {
                topic: topic.into(),
                reason: format!("{:?}", e),
            })
    }

    /// Collect every pending command, waiting at most the drain wait for
    /// each message.
    ///
    /// Malformed payloads and payloads without a `state` field are logged
    /// and skipped.
    pub fn drain(&mut self) -> Drained {
        let mut drained = Drained::default();
        if self.setup_mode || !self.client.is_connected() {
            return drained;
        }

        while let Some(msg) = self.client.recv_timeout(self.drain_wait_ms) {
            let Some(index) = self
                .subscriptions
                .iter()
                .find(|(topic, _)| topic.as_str() == msg.topic)
                .map(|(_, index)| *index)
            else {
                debug!("ignoring message on {}", msg.topic);
                continue;
            };
            drained.received += 1;

            debug!(
                "received on {}: {:?}",
                msg.topic,
                msg.payload_str().unwrap_or("<binary>")
            );
            match parse_switch_command(&msg.payload) {
                None => warn!("malformed command on {}", msg.topic),
                Some(cmd) => match cmd.value() {
                    Some(value) => drained.commands.push((index, value)),
                    None => warn!("command on {} has no state", msg.topic),
                },
            }
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::long_string;
    use crate::hal::MockMqtt;

    fn bridge() -> NetworkBridge<MockMqtt> {
        let mut bridge = NetworkBridge::new(MockMqtt::new(), &MqttConfig::default());
        bridge.register_subscription(long_string("sonoff/hall/switch/0"), 0);
        bridge.register_subscription(long_string("sonoff/hall/switch/1"), 1);
        bridge
    }

    #[test]
    fn connect_subscribes_and_reports_established() {
        let mut bridge = bridge();
        assert_eq!(bridge.connect(10), Ok(LinkStatus::Established));
        assert_eq!(
            bridge.client().subscriptions,
            ["sonoff/hall/switch/0", "sonoff/hall/switch/1"]
        );
        assert_eq!(bridge.connect(20), Ok(LinkStatus::Ready));
        assert_eq!(bridge.client().connect_attempts, 1);
    }

    #[test]
    fn failed_connect_tears_down() {
        let mut bridge = bridge();
        bridge.client_mut().fail_connect = true;
        assert!(matches!(bridge.connect(0), Err(BridgeError::Connect(_))));
        assert_eq!(bridge.client().disconnects, 1);
        assert!(bridge.client().subscriptions.is_empty());
    }

    #[test]
    fn setup_mode_suppresses_everything() {
        let mut bridge = bridge();
        bridge.set_setup_mode(true);
        assert_eq!(bridge.connect(0), Ok(LinkStatus::Suppressed));
        assert_eq!(bridge.client().connect_attempts, 0);
        assert_eq!(bridge.publish("t", "{}"), Ok(()));
        assert!(bridge.client().published.is_empty());
    }

    #[test]
    fn drain_maps_topics_to_outputs() {
        let mut bridge = bridge();
        bridge.connect(0).unwrap();
        let client = bridge.client_mut();
        client.queue_message("sonoff/hall/switch/1", r#"{"state":"off"}"#);
        client.queue_message("sonoff/hall/switch/0", r#"{"state":"ON"}"#);
        client.queue_message("other/topic", r#"{"state":"on"}"#);
        client.queue_message("sonoff/hall/switch/0", "garbage");
        client.queue_message("sonoff/hall/switch/0", r#"{"level":1}"#);

        let drained = bridge.drain();
        assert_eq!(drained.commands, [(1, true), (0, false)]);
        assert_eq!(drained.received, 4);
    }

    #[test]
    fn drain_needs_connection() {
        let mut bridge = bridge();
        bridge
            .client_mut()
            .queue_message("sonoff/hall/switch/0", r#"{"state":"on"}"#);
        assert_eq!(bridge.drain(), Drained::default());
    }

    #[test]
    fn keepalive_interval() {
        let mut bridge = bridge();
        bridge.connect(1_000).unwrap();
        bridge.keepalive(100_000);
        assert_eq!(bridge.client().pings, 0);
        bridge.keepalive(181_000);
        assert_eq!(bridge.client().pings, 1);
        bridge.keepalive(200_000);
        assert_eq!(bridge.client().pings, 1);
    }

    #[test]
    fn publish_failure_is_reported() {
        let mut bridge = bridge();
        bridge.connect(0).unwrap();
        bridge.client_mut().fail_publish = true;
        let err = bridge.publish("sonoff/hall/input/0", "{}").unwrap_err();
        assert!(matches!(err, BridgeError::Publish { .. }));
    }
}
