//! MQTT client for ESP32.
//!
//! Wraps the ESP-IDF MQTT client behind the [`MqttClient`] trait. Received
//! messages are forwarded by an event thread into a channel that the device
//! drains once per tick; the same thread tracks the connection state.
//!
//! # Example
//!
//! ```ignore
//! use relay_bridge::config::MqttConfig;
//! use relay_bridge::hal::esp32::Esp32Mqtt;
//! use relay_bridge::traits::MqttClient;
//!
//! let config = MqttConfig::default().with_host("192.168.1.100");
//! let mut mqtt = Esp32Mqtt::new(&config);
//! mqtt.connect()?;
//! mqtt.publish("sonoff/hall/input/0", b"{}", false)?;
//! ```

use crate::config::{MqttConfig, ShortString};
use crate::traits::{MqttClient, MqttMessage};
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest wait for the broker to acknowledge a new session.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Stack size of the event thread.
const EVENT_THREAD_STACK: usize = 6 * 1024;

/// Error type for ESP32 MQTT operations.
#[derive(Debug, thiserror::Error)]
pub enum Esp32MqttError {
    /// No session is open.
    #[error("not connected")]
    NotConnected,
    /// The broker did not acknowledge in time.
    #[error("connect timed out")]
    Timeout,
    /// ESP-IDF reported an error.
    #[error("esp-idf: {0}")]
    Esp(#[from] esp_idf_hal::sys::EspError),
}

/// Broker session over the ESP-IDF MQTT client.
///
/// The session is created on [`MqttClient::connect`] and dropped on
/// [`MqttClient::disconnect`], so every reconnect starts clean.
pub struct Esp32Mqtt {
    url: String,
    client_id: ShortString,
    username: ShortString,
    password: ShortString,
    keep_alive: Duration,
    session: Option<Session>,
}

/// One broker session. The `connected` flag is shared only with this
/// session's event thread.
struct Session {
    client: EspMqttClient<'static>,
    message_rx: Receiver<MqttMessage>,
    connected: Arc<AtomicBool>,
}

impl Esp32Mqtt {
    /// Prepare a client for the broker in `config`. Nothing connects yet.
    pub fn new(config: &MqttConfig) -> Self {
        let scheme = if config.fingerprint.is_empty() { "mqtt" } else { "mqtts" };
        Self {
            url: format!("{}://{}:{}", scheme, config.host.as_str(), config.port),
            client_id: config.client_id.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            keep_alive: Duration::from_secs(u64::from(config.keep_alive_secs)),
            session: None,
        }
    }

    fn start_session(&mut self) -> Result<(), Esp32MqttError> {
        let mqtt_config = MqttClientConfiguration {
            client_id: Some(self.client_id.as_str()),
            keep_alive_interval: Some(self.keep_alive),
            username: (!self.username.is_empty()).then(|| self.username.as_str()),
            password: (!self.password.is_empty()).then(|| self.password.as_str()),
            ..Default::default()
        };

        let (client, mut connection) = EspMqttClient::new(&self.url, &mqtt_config)?;
        let (message_tx, message_rx) = channel::<MqttMessage>();
        let connected = Arc::new(AtomicBool::new(false));
        let event_flag = Arc::clone(&connected);

        thread::Builder::new()
            .stack_size(EVENT_THREAD_STACK)
            .spawn(move || handle_mqtt_events(&mut connection, message_tx, event_flag))
            .map_err(|_| Esp32MqttError::NotConnected)?;

        self.session = Some(Session {
            client,
            message_rx,
            connected,
        });
        Ok(())
    }
}

impl MqttClient for Esp32Mqtt {
    type Error = Esp32MqttError;

    fn connect(&mut self) -> Result<(), Self::Error> {
        if self.session.is_none() {
            info!("mqtt: opening session to {}", self.url);
            self.start_session()?;
        }
        let connected = self
            .session
            .as_ref()
            .map(|s| Arc::clone(&s.connected))
            .ok_or(Esp32MqttError::NotConnected)?;
        let started = Instant::now();
        while !connected.load(Ordering::Acquire) {
            if started.elapsed() > CONNECT_TIMEOUT {
                return Err(Esp32MqttError::Timeout);
            }
            thread::sleep(Duration::from_millis(50));
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.connected.store(false, Ordering::Release);
        }
    }

    fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.connected.load(Ordering::Acquire))
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        let session = self.session.as_mut().ok_or(Esp32MqttError::NotConnected)?;
        session.client.enqueue(topic, QoS::AtMostOnce, retain, payload)?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        let session = self.session.as_mut().ok_or(Esp32MqttError::NotConnected)?;
        session.client.subscribe(topic, QoS::AtLeastOnce)?;
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        let session = self.session.as_ref()?;
        match session.message_rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                session.connected.store(false, Ordering::Release);
                None
            }
        }
    }

    fn recv_timeout(&mut self, timeout_ms: u32) -> Option<MqttMessage> {
        let session = self.session.as_ref()?;
        match session
            .message_rx
            .recv_timeout(Duration::from_millis(u64::from(timeout_ms)))
        {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                session.connected.store(false, Ordering::Release);
                None
            }
        }
    }
}

fn handle_mqtt_events(
    connection: &mut EspMqttConnection,
    message_tx: Sender<MqttMessage>,
    connected: Arc<AtomicBool>,
) {
    loop {
        match connection.next() {
            Err(e) => {
                debug!("mqtt: event loop ended: {:?}", e);
                connected.store(false, Ordering::Release);
                return;
            }
            Ok(event) => match event.payload() {
                EventPayload::Connected(_) => {
                    info!("mqtt: connected");
                    connected.store(true, Ordering::Release);
                }
                EventPayload::Disconnected => {
                    warn!("mqtt: disconnected");
                    connected.store(false, Ordering::Release);
                }
                EventPayload::Received {
                    topic: Some(topic),
                    data,
                    ..
                } => {
                    if message_tx
                        .send(MqttMessage::new(topic.to_string(), data.to_vec()))
                        .is_err()
                    {
                        return;
                    }
                }
                _ => {}
            },
        }
    }
}
