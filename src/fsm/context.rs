//! Session state threaded through every FSM handler.
//!
//! `SessionContext` is the blackboard the state handlers read from and
//! write to: the clock, the connection, the last error, the authorization
//! grant, the in-flight WiFi attempt and its latest observed result, and
//! the response waiting to be sent.

use core::net::Ipv4Addr;

use crate::app::ports::{ConnHandle, ConnectivityPort};
use crate::config::ImprovConfig;
use crate::improv::ImprovError;
use crate::improv::codec::{Password, ResponseFrame, Ssid};

/// An outstanding WiFi connection attempt.
///
/// Outlives a BLE disconnect: it is dropped only on success or timeout,
/// or when new credentials replace it.
#[derive(Clone)]
pub struct WifiAttempt {
    pub ssid: Ssid,
    pub password: Password,
    pub started_at: u64,
}

impl core::fmt::Debug for WifiAttempt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WifiAttempt")
            .field("ssid", &self.ssid)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl WifiAttempt {
    pub fn deadline(&self, timeout_ms: u32) -> u64 {
        self.started_at + u64::from(timeout_ms)
    }
}

/// WiFi manager state sampled once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WifiSnapshot {
    pub connected: bool,
    pub ip: Option<Ipv4Addr>,
}

impl WifiSnapshot {
    pub fn read(wifi: &impl ConnectivityPort) -> Self {
        Self {
            connected: wifi.is_connected(),
            ip: wifi.ip_address(),
        }
    }

    /// Usable for provisioning: link up with an address.
    pub fn address(&self) -> Option<Ipv4Addr> {
        if self.connected { self.ip } else { None }
    }
}

pub struct SessionContext {
    pub config: ImprovConfig,
    /// Set by the owner before every handler call.
    pub now_ms: u64,
    pub connection: Option<ConnHandle>,
    /// Persists until overwritten; never auto-clears.
    pub error: ImprovError,
    pub authorized_since: Option<u64>,
    pub attempt: Option<WifiAttempt>,
    pub wifi: WifiSnapshot,
    /// Response for the rpc-result characteristic, sent by the owner.
    pub outbox: Option<ResponseFrame>,
}

impl SessionContext {
    pub fn new(config: ImprovConfig) -> Self {
        Self {
            config,
            now_ms: 0,
            connection: None,
            error: ImprovError::None,
            authorized_since: None,
            attempt: None,
            wifi: WifiSnapshot::default(),
            outbox: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Whether the authorization grant has run out at `now_ms`.
    pub fn grant_expired(&self) -> bool {
        self.authorized_since.is_some_and(|since| {
            self.now_ms.saturating_sub(since) >= u64::from(self.config.authorized_duration_ms)
        })
    }

    /// Whether the outstanding attempt has run past its window.
    pub fn attempt_timed_out(&self) -> bool {
        self.attempt
            .as_ref()
            .is_some_and(|a| self.now_ms >= a.deadline(self.config.wifi_timeout_ms))
    }
}
