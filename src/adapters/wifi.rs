//! WiFi station-mode bring-up.
//!
//! The gateway needs the network before the broker link can start, so
//! this is a one-shot blocking connect at boot.  Link loss after that is
//! the broker adapter's concern.
//!
//! - **`target_os = "espidf"`**: `BlockingWifi<EspWifi>` in STA mode.
//! - **all other targets**: only credential validation is compiled.

use core::fmt;

use super::utils::is_printable_ascii;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

impl std::error::Error for WifiError {}

pub fn validate_credentials(ssid: &str, password: &str) -> Result<(), WifiError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(WifiError::InvalidSsid);
    }
    if !password.is_empty() && !(8..=64).contains(&password.len()) {
        return Err(WifiError::InvalidPassword);
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
pub use esp::connect_station;

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_hal::modem::Modem;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
    use log::{info, warn};

    use super::{WifiError, validate_credentials};

    /// Join the access point and wait for an IP.
    pub fn connect_station(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        ssid: &str,
        password: &str,
    ) -> Result<BlockingWifi<EspWifi<'static>>, WifiError> {
        validate_credentials(ssid, password)?;
        let fail = |e: esp_idf_sys::EspError| {
            warn!("WiFi: {}", e);
            WifiError::ConnectionFailed
        };

        let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sysloop.clone(), nvs).map_err(fail)?, sysloop)
            .map_err(fail)?;
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| WifiError::InvalidSsid)?,
            password: password.try_into().map_err(|_| WifiError::InvalidPassword)?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        }))
        .map_err(fail)?;

        wifi.start().map_err(fail)?;
        wifi.connect().map_err(fail)?;
        wifi.wait_netif_up().map_err(fail)?;
        info!("WiFi: connected to '{}'", ssid);
        Ok(wifi)
    }
}
