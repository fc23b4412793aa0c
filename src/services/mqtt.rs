//! Desktop MQTT client over `rumqttc`.
//!
//! [`RumqttClient`] implements [`MqttClient`] with the synchronous
//! `rumqttc` API so a [`Device`](crate::Device) can run against a real
//! broker from a desktop process. The connection's event iterator runs on
//! its own thread; it forwards publishes into a channel and tracks whether
//! the broker acknowledged the session.
//!
//! # Example
//!
//! ```ignore
//! use relay_bridge::config::MqttConfig;
//! use relay_bridge::services::RumqttClient;
//! use relay_bridge::traits::MqttClient;
//!
//! let config = MqttConfig::default().with_host("localhost");
//! let mut client = RumqttClient::new(&config);
//! client.connect()?;
//! client.subscribe("sonoff/hall/switch/0")?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use tracing::{debug, info, warn};

use crate::config::MqttConfig;
use crate::traits::{MqttClient, MqttMessage};

/// Capacity of the request channel between client and event loop.
const REQUEST_CAPACITY: usize = 16;

/// Longest wait for the broker's connection acknowledgement.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Errors
// ============================================================================

/// Error returned by [`RumqttClient`].
#[derive(Debug, thiserror::Error)]
pub enum RumqttError {
    /// No session is open.
    #[error("not connected")]
    NotConnected,
    /// The broker did not acknowledge the session in time.
    #[error("connect timed out")]
    Timeout,
    /// The event loop stopped before the session came up.
    #[error("connection failed: {0}")]
    Connection(String),
    /// The request could not be queued.
    #[error("client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

// ============================================================================
// Client
// ============================================================================

/// Flags shared by one session and its event-loop thread.
#[derive(Debug, Default)]
struct SessionState {
    connected: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl SessionState {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn set_connected(&self, up: bool) {
        self.connected.store(up, Ordering::Release);
    }

    fn fail(&self, error: String) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = Some(error);
        }
    }

    fn take_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|mut e| e.take())
    }
}

struct Session {
    client: Client,
    messages: Receiver<MqttMessage>,
    state: Arc<SessionState>,
}

/// Broker session over the synchronous `rumqttc` client.
///
/// Each [`MqttClient::connect`] opens a fresh session and
/// [`MqttClient::disconnect`] tears it down; `rumqttc`'s own reconnect is
/// not used, so reconnect timing stays with the device. Connection flags
/// belong to a single session, so an event loop left over from an earlier
/// session can never touch the current one.
pub struct RumqttClient {
    options: MqttOptions,
    session: Option<Session>,
}

impl RumqttClient {
    /// Prepare a client for the broker in `config`. Nothing connects yet.
    pub fn new(config: &MqttConfig) -> Self {
        Self {
            options: options_from_config(config),
            session: None,
        }
    }

    /// Broker address in `host:port` form.
    pub fn broker(&self) -> String {
        let (host, port) = self.options.broker_address();
        format!("{}:{}", host, port)
    }

    fn open_session(&mut self) {
        let (client, connection) = Client::new(self.options.clone(), REQUEST_CAPACITY);
        let (message_tx, messages) = channel();
        let state = Arc::new(SessionState::default());
        let loop_state = Arc::clone(&state);
        thread::spawn(move || run_event_loop(connection, message_tx, loop_state));
        self.session = Some(Session {
            client,
            messages,
            state,
        });
    }

    fn session_state(&self) -> Option<Arc<SessionState>> {
        self.session.as_ref().map(|s| Arc::clone(&s.state))
    }
}

/// Build `rumqttc` options from the shared config.
pub fn options_from_config(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(
        config.client_id.as_str(),
        config.host.as_str(),
        config.port,
    );
    options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)));
    options.set_clean_session(true);
    if config.has_auth() {
        options.set_credentials(config.username.as_str(), config.password.as_str());
    }
    options
}

impl MqttClient for RumqttClient {
    type Error = RumqttError;

    fn connect(&mut self) -> Result<(), Self::Error> {
        if self.session.is_none() {
            info!("mqtt: connecting to {}", self.broker());
            self.open_session();
        }
        let state = self.session_state().ok_or(RumqttError::NotConnected)?;
        let started = Instant::now();
        while !state.is_connected() {
            if let Some(error) = state.take_error() {
                return Err(RumqttError::Connection(error));
            }
            if started.elapsed() > CONNECT_TIMEOUT {
                return Err(RumqttError::Timeout);
            }
            thread::sleep(Duration::from_millis(20));
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.client.disconnect() {
                debug!("mqtt: disconnect request failed: {}", e);
            }
            session.state.set_connected(false);
        }
    }

    fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.state.is_connected())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        let session = self.session.as_mut().ok_or(RumqttError::NotConnected)?;
        session
            .client
            .try_publish(topic, QoS::AtMostOnce, retain, payload.to_vec())?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        let session = self.session.as_mut().ok_or(RumqttError::NotConnected)?;
        session.client.subscribe(topic, QoS::AtLeastOnce)?;
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        let session = self.session.as_ref()?;
        match session.messages.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                session.state.set_connected(false);
                None
            }
        }
    }

    fn recv_timeout(&mut self, timeout_ms: u32) -> Option<MqttMessage> {
        let session = self.session.as_ref()?;
        match session
            .messages
            .recv_timeout(Duration::from_millis(u64::from(timeout_ms)))
        {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                session.state.set_connected(false);
                None
            }
        }
    }
}

fn run_event_loop(
    mut connection: Connection,
    message_tx: Sender<MqttMessage>,
    state: Arc<SessionState>,
) {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("mqtt: session acknowledged");
                state.set_connected(true);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let msg = MqttMessage::new(publish.topic, publish.payload.to_vec());
                if message_tx.send(msg).is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("mqtt: broker closed the session");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("mqtt: {}", e);
                state.fail(e.to_string());
                break;
            }
        }
    }
    state.set_connected(false);
}
