//! Persisted device settings.
//!
//! Settings live in one fixed-layout blob: the entries of [`LAYOUT`]
//! concatenated in order, without padding or delimiters. The blob is always
//! loaded and saved whole through a [`SettingsStore`].
//!
//! | Kind | Encoding |
//! |------|----------|
//! | text, password | UTF-8, NUL padded, at most `len - 1` bytes |
//! | flag | one byte, `0` or `1` |
//! | integer | 32-bit little endian |
//!
//! New entries may only be appended, so older blobs keep their offsets.
//!
//! # Example
//!
//! ```rust
//! use relay_bridge::hal::MemoryStore;
//! use relay_bridge::settings::{SettingKey, Settings};
//!
//! let mut store = MemoryStore::new();
//!
//! // Nothing stored yet: defaults are written back and returned.
//! let settings = Settings::restore(&mut store).unwrap();
//! assert!(settings.setup_required());
//! assert_eq!(settings.text(SettingKey::Hostname), "relay-bridge");
//! assert_eq!(store.saves, 1);
//! ```

use alloc::vec::Vec;

use tracing::{info, warn};

use crate::config::{fitting_prefix, Config, DeviceConfig, MqttConfig, WifiConfig, DEFAULT_HOSTNAME};
use crate::error::SettingsError;

/// Whole-blob persistence backend.
pub trait SettingsStore {
    /// Read the stored blob, `None` if nothing was ever saved.
    fn load(&mut self) -> Result<Option<Vec<u8>>, SettingsError>;

    /// Replace the stored blob.
    fn save(&mut self, blob: &[u8]) -> Result<(), SettingsError>;
}

/// Identifier of a setting. The discriminant is its position in [`LAYOUT`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingKey {
    /// WiFi network name.
    Ssid = 0,
    /// WiFi pre-shared key.
    Psk,
    /// Network hostname and topic segment.
    Hostname,
    /// Setup required; cleared once the device has been configured.
    Reset,
    /// Broker host.
    MqttHost,
    /// Broker port.
    MqttPort,
    /// Broker username.
    MqttUsername,
    /// Broker password.
    MqttPassword,
    /// Broker certificate fingerprint.
    MqttFingerprint,
}

/// Value type of a setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingKind {
    /// Free text.
    Text,
    /// Text that is never echoed back.
    Password,
    /// Boolean.
    Flag,
    /// Signed 32-bit integer.
    Integer,
}

/// Default value of a setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingDefault {
    /// Default text.
    Text(&'static str),
    /// Default flag.
    Flag(bool),
    /// Default integer.
    Integer(i32),
}

/// One entry of the blob layout.
#[derive(Clone, Copy, Debug)]
pub struct SettingEntry {
    /// Identifier.
    pub key: SettingKey,
    /// Short label.
    pub name: &'static str,
    /// Help text.
    pub description: &'static str,
    /// Value type.
    pub kind: SettingKind,
    /// Bytes reserved in the blob.
    pub len: usize,
    /// Shown in the setup form.
    pub visible: bool,
    /// Value written by a reset.
    pub default: SettingDefault,
}

const fn text(
    key: SettingKey,
    name: &'static str,
    description: &'static str,
    len: usize,
    default: &'static str,
) -> SettingEntry {
    SettingEntry {
        key,
        name,
        description,
        kind: SettingKind::Text,
        len,
        visible: true,
        default: SettingDefault::Text(default),
    }
}

const fn password(
    key: SettingKey,
    name: &'static str,
    description: &'static str,
    len: usize,
) -> SettingEntry {
    SettingEntry {
        key,
        name,
        description,
        kind: SettingKind::Password,
        len,
        visible: true,
        default: SettingDefault::Text(""),
    }
}

/// Blob layout, in storage order.
pub const LAYOUT: [SettingEntry; 9] = [
    text(SettingKey::Ssid, "SSID", "WiFi network to join", 32, ""),
    password(SettingKey::Psk, "PSK", "WiFi pre-shared key", 64),
    text(
        SettingKey::Hostname,
        "Hostname",
        "Network name, also used in topics",
        32,
        DEFAULT_HOSTNAME,
    ),
    SettingEntry {
        key: SettingKey::Reset,
        name: "Reset",
        description: "Start in setup mode",
        kind: SettingKind::Flag,
        len: 1,
        visible: false,
        default: SettingDefault::Flag(true),
    },
    text(SettingKey::MqttHost, "MQTT host", "Broker host name or address", 64, ""),
    SettingEntry {
        key: SettingKey::MqttPort,
        name: "MQTT port",
        description: "Broker port",
        kind: SettingKind::Integer,
        len: 4,
        visible: true,
        default: SettingDefault::Integer(1883),
    },
    text(SettingKey::MqttUsername, "MQTT username", "Broker user", 32, ""),
    password(SettingKey::MqttPassword, "MQTT password", "Broker password", 32),
    text(
        SettingKey::MqttFingerprint,
        "MQTT fingerprint",
        "SHA1 fingerprint of the broker certificate",
        60,
        "",
    ),
];

const fn layout_len() -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < LAYOUT.len() {
        total += LAYOUT[i].len;
        i += 1;
    }
    total
}

/// Total blob length.
pub const BLOB_LEN: usize = layout_len();

/// Layout entry of `key`.
pub fn entry(key: SettingKey) -> &'static SettingEntry {
    &LAYOUT[key as usize]
}

/// Byte offset of `key` in the blob.
pub fn offset(key: SettingKey) -> usize {
    LAYOUT[..key as usize].iter().map(|e| e.len).sum()
}

/// In-memory copy of the settings blob.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    blob: [u8; BLOB_LEN],
}

impl core::fmt::Debug for Settings {
    // Passwords stay out of logs.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Settings")
            .field("hostname", &self.text(SettingKey::Hostname))
            .field("reset", &self.flag(SettingKey::Reset))
            .field("mqtt_host", &self.text(SettingKey::MqttHost))
            .field("mqtt_port", &self.integer(SettingKey::MqttPort))
            .finish_non_exhaustive()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Settings {
    /// Settings holding every default value.
    pub fn defaults() -> Self {
        let mut settings = Self {
            blob: [0; BLOB_LEN],
        };
        for e in &LAYOUT {
            match e.default {
                SettingDefault::Text(value) => settings.set_text(e.key, value),
                SettingDefault::Flag(value) => settings.set_flag(e.key, value),
                SettingDefault::Integer(value) => settings.set_integer(e.key, value),
            }
        }
        settings
    }

    /// Parse a stored blob.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SettingsError> {
        let blob: [u8; BLOB_LEN] = bytes.try_into().map_err(|_| SettingsError::Length {
            expected: BLOB_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self { blob })
    }

    /// Raw blob.
    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }

    /// Load settings from `store`.
    ///
    /// A missing blob or one with the wrong length is replaced by the
    /// defaults, which are saved before being returned.
    pub fn restore(store: &mut dyn SettingsStore) -> Result<Self, SettingsError> {
        match store.load()? {
            Some(bytes) => match Self::from_bytes(&bytes) {
                Ok(settings) => return Ok(settings),
                Err(e) => warn!("stored settings rejected: {}", e),
            },
            None => info!("no stored settings"),
        }
        Self::save_defaults(store)
    }

    /// Overwrite the stored blob with the defaults.
    pub fn save_defaults(store: &mut dyn SettingsStore) -> Result<Self, SettingsError> {
        let settings = Self::defaults();
        settings.save(store)?;
        info!("default settings saved");
        Ok(settings)
    }

    /// Write the blob to `store`.
    pub fn save(&self, store: &mut dyn SettingsStore) -> Result<(), SettingsError> {
        store.save(&self.blob)
    }

    fn field(&self, key: SettingKey) -> &[u8] {
        let start = offset(key);
        &self.blob[start..start + entry(key).len]
    }

    fn field_mut(&mut self, key: SettingKey) -> &mut [u8] {
        let start = offset(key);
        &mut self.blob[start..start + entry(key).len]
    }

    /// Text value of `key`, up to the first NUL.
    ///
    /// Bytes that are not valid UTF-8 read as an empty string.
    pub fn text(&self, key: SettingKey) -> &str {
        let field = self.field(key);
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        core::str::from_utf8(&field[..end]).unwrap_or("")
    }

    /// Store text for `key`, truncated so a terminating NUL always fits.
    pub fn set_text(&mut self, key: SettingKey, value: &str) {
        let field = self.field_mut(key);
        let value = fitting_prefix(value, field.len().saturating_sub(1));
        field.fill(0);
        field[..value.len()].copy_from_slice(value.as_bytes());
    }

    /// Flag value of `key`.
    pub fn flag(&self, key: SettingKey) -> bool {
        self.field(key).first().is_some_and(|&b| b != 0)
    }

    /// Store a flag for `key`.
    pub fn set_flag(&mut self, key: SettingKey, value: bool) {
        if let Some(b) = self.field_mut(key).first_mut() {
            *b = u8::from(value);
        }
    }

    /// Integer value of `key`.
    pub fn integer(&self, key: SettingKey) -> i32 {
        let mut bytes = [0u8; 4];
        let field = self.field(key);
        let n = field.len().min(4);
        bytes[..n].copy_from_slice(&field[..n]);
        i32::from_le_bytes(bytes)
    }

    /// Store an integer for `key`.
    pub fn set_integer(&mut self, key: SettingKey, value: i32) {
        let field = self.field_mut(key);
        let n = field.len().min(4);
        field[..n].copy_from_slice(&value.to_le_bytes()[..n]);
    }

    /// True until the device has been configured.
    pub fn setup_required(&self) -> bool {
        self.flag(SettingKey::Reset)
    }

    /// Map the stored values onto a runtime configuration.
    ///
    /// Settings that have no stored counterpart keep their defaults.
    pub fn to_config(&self) -> Config {
        let hostname = self.text(SettingKey::Hostname);
        let port = u16::try_from(self.integer(SettingKey::MqttPort)).unwrap_or_else(|_| {
            warn!("stored broker port out of range, using 1883");
            1883
        });

        Config::default()
            .with_wifi(
                WifiConfig::default()
                    .with_ssid(self.text(SettingKey::Ssid))
                    .with_password(self.text(SettingKey::Psk)),
            )
            .with_mqtt(
                MqttConfig::default()
                    .with_host(self.text(SettingKey::MqttHost))
                    .with_port(port)
                    .with_client_id(hostname)
                    .with_auth(
                        self.text(SettingKey::MqttUsername),
                        self.text(SettingKey::MqttPassword),
                    )
                    .with_fingerprint(self.text(SettingKey::MqttFingerprint)),
            )
            .with_device(DeviceConfig::default().with_hostname(hostname))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MemoryStore;

    #[test]
    fn layout_offsets() {
        assert_eq!(BLOB_LEN, 321);
        assert_eq!(offset(SettingKey::Ssid), 0);
        assert_eq!(offset(SettingKey::Psk), 32);
        assert_eq!(offset(SettingKey::Hostname), 96);
        assert_eq!(offset(SettingKey::Reset), 128);
        assert_eq!(offset(SettingKey::MqttHost), 129);
        assert_eq!(offset(SettingKey::MqttPort), 193);
        assert_eq!(offset(SettingKey::MqttFingerprint), 261);
    }

    #[test]
    fn layout_keys_match_positions() {
        for (i, e) in LAYOUT.iter().enumerate() {
            assert_eq!(e.key as usize, i);
        }
    }

    #[test]
    fn defaults_encode() {
        let settings = Settings::defaults();
        assert_eq!(settings.text(SettingKey::Hostname), "relay-bridge");
        assert!(settings.flag(SettingKey::Reset));
        assert_eq!(settings.integer(SettingKey::MqttPort), 1883);
        assert_eq!(&settings.as_bytes()[193..197], &[0x5B, 0x07, 0, 0]);
        assert_eq!(settings.text(SettingKey::Ssid), "");
    }

    #[test]
    fn text_is_truncated_to_leave_terminator() {
        let mut settings = Settings::defaults();
        let long = "h".repeat(40);
        settings.set_text(SettingKey::Hostname, &long);
        assert_eq!(settings.text(SettingKey::Hostname).len(), 31);
        assert_eq!(settings.as_bytes()[offset(SettingKey::Hostname) + 31], 0);
        // Neighbour untouched.
        assert!(settings.flag(SettingKey::Reset));
    }

    #[test]
    fn shorter_text_clears_old_tail() {
        let mut settings = Settings::defaults();
        settings.set_text(SettingKey::MqttHost, "broker.example.org");
        settings.set_text(SettingKey::MqttHost, "10.0.0.2");
        assert_eq!(settings.text(SettingKey::MqttHost), "10.0.0.2");
    }

    #[test]
    fn wrong_length_blob_is_rejected() {
        assert_eq!(
            Settings::from_bytes(&[0; 12]),
            Err(SettingsError::Length {
                expected: 321,
                actual: 12
            })
        );
    }

    #[test]
    fn restore_keeps_valid_blob() {
        let mut stored = Settings::defaults();
        stored.set_flag(SettingKey::Reset, false);
        stored.set_text(SettingKey::Ssid, "home");
        let mut store = MemoryStore::with_blob(stored.as_bytes().to_vec());

        let settings = Settings::restore(&mut store).unwrap();
        assert!(!settings.setup_required());
        assert_eq!(settings.text(SettingKey::Ssid), "home");
        assert_eq!(store.saves, 0);
    }

    #[test]
    fn restore_replaces_wrong_length_blob() {
        let mut store = MemoryStore::with_blob(alloc::vec![1, 2, 3]);
        let settings = Settings::restore(&mut store).unwrap();
        assert_eq!(settings, Settings::defaults());
        assert_eq!(store.saves, 1);
        assert_eq!(store.blob.as_deref(), Some(Settings::defaults().as_bytes()));
    }

    #[test]
    fn storage_failure_propagates() {
        let mut store = MemoryStore::new();
        store.fail_save = true;
        assert!(matches!(
            Settings::restore(&mut store),
            Err(SettingsError::Storage(_))
        ));
    }

    #[test]
    fn config_mapping() {
        let mut settings = Settings::defaults();
        settings.set_text(SettingKey::Hostname, "porch");
        settings.set_text(SettingKey::MqttHost, "10.0.0.2");
        settings.set_integer(SettingKey::MqttPort, 8883);
        settings.set_text(SettingKey::MqttUsername, "relay");
        settings.set_text(SettingKey::Psk, "secret");

        let config = settings.to_config();
        assert_eq!(config.device.hostname.as_str(), "porch");
        assert_eq!(config.mqtt.client_id.as_str(), "porch");
        assert_eq!(config.mqtt.host.as_str(), "10.0.0.2");
        assert_eq!(config.mqtt.port, 8883);
        assert!(config.mqtt.has_auth());
        assert_eq!(config.wifi.password.as_str(), "secret");
    }

    #[test]
    fn out_of_range_port_falls_back() {
        let mut settings = Settings::defaults();
        settings.set_integer(SettingKey::MqttPort, -1);
        assert_eq!(settings.to_config().mqtt.port, 1883);
    }

    #[test]
    fn debug_hides_passwords() {
        let mut settings = Settings::defaults();
        settings.set_text(SettingKey::MqttPassword, "hunter2");
        let rendered = alloc::format!("{:?}", settings);
        assert!(!rendered.contains("hunter2"));
    }
}
