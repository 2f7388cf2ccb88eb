//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`] for Improv provisioning: a connection
//! attempt is started without blocking, and the service samples
//! [`is_connected`](ConnectivityPort::is_connected) /
//! [`ip_address`](ConnectivityPort::ip_address) once per tick until the
//! link comes up or its timeout runs out.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` in STA mode.
//! - **all other targets**: simulation that "connects" a few polls after
//!   the attempt starts, handing out an address from 192.0.2.0/24.

use core::net::Ipv4Addr;

use log::{info, warn};

use super::utils::{is_valid_password, is_valid_ssid};
use crate::app::ports::{ConnectivityError, ConnectivityPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Idle,
    Connecting,
    Connected,
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF adapter
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct WifiAdapter {
    wifi: esp_idf_svc::wifi::EspWifi<'static>,
    state: WifiState,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    pub fn new(wifi: esp_idf_svc::wifi::EspWifi<'static>) -> Self {
        Self {
            wifi,
            state: WifiState::Idle,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }
}

#[cfg(target_os = "espidf")]
impl ConnectivityPort for WifiAdapter {
    fn start_connecting(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        if !is_valid_ssid(ssid) {
            return Err(ConnectivityError::InvalidSsid);
        }
        if !is_valid_password(password) {
            return Err(ConnectivityError::InvalidPassword);
        }

        if self.wifi.is_connected().unwrap_or(false) {
            let _ = self.wifi.disconnect();
        }

        let config = Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: password
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });

        self.wifi.set_configuration(&config).map_err(|e| {
            warn!("WiFi(espidf): set_configuration failed: {}", e);
            ConnectivityError::ConnectionFailed
        })?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|e| {
                warn!("WiFi(espidf): start failed: {}", e);
                ConnectivityError::ConnectionFailed
            })?;
        }
        self.wifi.connect().map_err(|e| {
            warn!("WiFi(espidf): connect failed: {}", e);
            ConnectivityError::ConnectionFailed
        })?;

        self.state = WifiState::Connecting;
        info!("WiFi(espidf): connecting to '{}'", ssid);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn ip_address(&self) -> Option<Ipv4Addr> {
        let info = self.wifi.sta_netif().get_ip_info().ok()?;
        (!info.ip.is_unspecified()).then_some(info.ip)
    }

    fn poll(&mut self) {
        if self.state == WifiState::Connecting && self.ip_address().is_some() {
            self.state = WifiState::Connected;
            info!("WiFi(espidf): connected");
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation adapter
// ───────────────────────────────────────────────────────────────

/// Polls between `start_connecting` and the simulated link coming up.
#[cfg(not(target_os = "espidf"))]
const SIM_CONNECT_POLLS: u32 = 3;

#[cfg(not(target_os = "espidf"))]
pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    polls: u32,
    attempts: u8,
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            state: WifiState::Idle,
            ssid: heapless::String::new(),
            polls: 0,
            attempts: 0,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }
}

#[cfg(not(target_os = "espidf"))]
impl ConnectivityPort for WifiAdapter {
    fn start_connecting(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        if !is_valid_ssid(ssid) {
            return Err(ConnectivityError::InvalidSsid);
        }
        if !is_valid_password(password) {
            return Err(ConnectivityError::InvalidPassword);
        }
        self.ssid.clear();
        self.ssid
            .push_str(ssid)
            .map_err(|()| ConnectivityError::InvalidSsid)?;
        self.state = WifiState::Connecting;
        self.polls = 0;
        self.attempts = self.attempts.wrapping_add(1);
        info!("WiFi(sim): connecting to '{}'", self.ssid);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state == WifiState::Connected
    }

    fn ip_address(&self) -> Option<Ipv4Addr> {
        self.is_connected()
            .then(|| Ipv4Addr::new(192, 0, 2, 4 + self.attempts % 250))
    }

    /// SSIDs starting with `unreachable` never come up.
    fn poll(&mut self) {
        if self.state != WifiState::Connecting || self.ssid.starts_with("unreachable") {
            return;
        }
        self.polls += 1;
        if self.polls >= SIM_CONNECT_POLLS {
            self.state = WifiState::Connected;
            info!("WiFi(sim): connected to '{}'", self.ssid);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
