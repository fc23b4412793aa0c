//! Settings persistence in the NVS flash partition.

use crate::error::SettingsError;
use crate::settings::SettingsStore;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

/// NVS namespace holding the settings.
pub const NAMESPACE: &str = "relay-bridge";

/// Key of the settings blob inside [`NAMESPACE`].
pub const BLOB_KEY: &str = "settings";

/// Settings store keeping the whole blob under one NVS key.
///
/// # Example
///
/// ```ignore
/// use relay_bridge::hal::esp32::NvsStore;
/// use relay_bridge::settings::Settings;
///
/// let nvs = EspDefaultNvsPartition::take()?;
/// let mut store = NvsStore::new(nvs)?;
/// let settings = Settings::restore(&mut store)?;
/// ```
pub struct NvsStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStore {
    /// Open the settings namespace read-write.
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, SettingsError> {
        let nvs = EspNvs::new(partition, NAMESPACE, true).map_err(storage)?;
        Ok(Self { nvs })
    }
}

fn storage(e: esp_idf_hal::sys::EspError) -> SettingsError {
    SettingsError::Storage(e.to_string())
}

impl SettingsStore for NvsStore {
    fn load(&mut self) -> Result<Option<Vec<u8>>, SettingsError> {
        let Some(len) = self.nvs.blob_len(BLOB_KEY).map_err(storage)? else {
            return Ok(None);
        };
        let mut buf = vec![0u8; len];
        let blob = self.nvs.get_blob(BLOB_KEY, &mut buf).map_err(storage)?;
        Ok(blob.map(<[u8]>::to_vec))
    }

    fn save(&mut self, blob: &[u8]) -> Result<(), SettingsError> {
        self.nvs.set_blob(BLOB_KEY, blob).map_err(storage)
    }
}
