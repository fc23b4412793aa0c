//! WiFi station connection for ESP32.
//!
//! # Example
//!
//! ```ignore
//! use relay_bridge::hal::esp32::Esp32Wifi;
//! use relay_bridge::config::WifiConfig;
//!
//! let config = WifiConfig::default()
//!     .with_ssid("MyNetwork")
//!     .with_password("secret123");
//!
//! let wifi = Esp32Wifi::new(modem, sysloop, nvs, "hall-light", &config)?;
//! // WiFi is now connected and has an IP address
//! ```

use crate::config::WifiConfig;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use std::net::Ipv4Addr;
use tracing::{info, warn};

/// Station-mode WiFi, connected for the lifetime of this struct.
pub struct Esp32Wifi<'a> {
    wifi: BlockingWifi<EspWifi<'a>>,
}

impl<'a> Esp32Wifi<'a> {
    /// Bring the interface up and wait for DHCP.
    ///
    /// `hostname` is announced to the DHCP server.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver cannot start, the access point
    /// rejects the credentials or DHCP does not complete.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        hostname: &str,
        config: &WifiConfig,
    ) -> anyhow::Result<Self> {
        let mut esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        if let Err(e) = esp_wifi.sta_netif_mut().set_hostname(hostname) {
            warn!("wifi: hostname not set: {}", e);
        }
        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;

        let mut ssid: heapless::String<32> = heapless::String::new();
        let _ = ssid.push_str(config.ssid.as_str());
        let mut password: heapless::String<64> = heapless::String::new();
        let _ = password.push_str(config.password.as_str());

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid,
            password,
            ..Default::default()
        }))?;

        wifi.start()?;
        info!("wifi: connecting to '{}'", config.ssid.as_str());
        wifi.connect()?;
        wifi.wait_netif_up()?;

        if let Ok(ip_info) = wifi.wifi().sta_netif().get_ip_info() {
            info!("wifi: connected, ip {}", ip_info.ip);
        }

        Ok(Self { wifi })
    }

    /// Current address, if connected.
    pub fn ip_addr(&self) -> Option<Ipv4Addr> {
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
    }

    /// Check if WiFi is connected.
    pub fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }
}
