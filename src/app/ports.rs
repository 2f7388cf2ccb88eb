//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ImprovService / AdvertisementRelay (domain)
//! ```
//!
//! Driven adapters (BLE host, WiFi, status indicator, upstream API, config
//! storage) implement these traits.  The domain components consume them via
//! generics, so the core never touches the radio or the network directly.
//!
//! All port errors are typed; callers log them and carry on.

use core::fmt;
use core::net::Ipv4Addr;

use crate::config::SystemConfig;
use crate::error::TransportError;
use crate::improv::Characteristic;
use crate::relay::messages::{ScannerMode, UpstreamMessage};
use crate::relay::subscribers::SubscriberId;

// ───────────────────────────────────────────────────────────────
// BLE host port (domain → BLE stack)
// ───────────────────────────────────────────────────────────────

/// Opaque connection handle assigned by the BLE host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle(pub u16);

/// GAP scan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParams {
    pub mode: ScannerMode,
    /// 0.625 ms units
    pub interval: u16,
    /// 0.625 ms units
    pub window: u16,
    /// Always false for the relay: every sighting is forwarded.
    pub filter_duplicates: bool,
}

/// GAP + GATT server operations the domain needs.
///
/// Every call must return promptly; none may block on the radio.
pub trait BleHostPort {
    /// Start (or restart) connectable advertising of the Improv service.
    /// Idempotent: restarting while already advertising is not an error.
    fn start_advertising(&mut self) -> Result<(), TransportError>;

    fn stop_advertising(&mut self) -> Result<(), TransportError>;

    fn start_scan(&mut self, params: &ScanParams) -> Result<(), TransportError>;

    fn stop_scan(&mut self) -> Result<(), TransportError>;

    /// Send a notification on `characteristic` to `conn`.
    fn notify(
        &mut self,
        conn: ConnHandle,
        characteristic: Characteristic,
        data: &[u8],
    ) -> Result<(), TransportError>;

    /// Update the value the adapter serves for reads of `characteristic`.
    fn set_value(&mut self, characteristic: Characteristic, data: &[u8]) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (domain → WiFi manager)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    InvalidSsid,
    InvalidPassword,
    /// The driver refused to start the attempt.
    ConnectionFailed,
}

impl fmt::Display for ConnectivityError {
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

/// Station-mode WiFi connection manager.
pub trait ConnectivityPort {
    /// Begin a non-blocking connection attempt, dropping any current link.
    fn start_connecting(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;

    /// True once the link is up and an address has been acquired.
    fn is_connected(&self) -> bool;

    fn ip_address(&self) -> Option<Ipv4Addr>;

    /// Advance any internal connection bookkeeping.
    fn poll(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// Indicator port (domain → status LED)
// ───────────────────────────────────────────────────────────────

/// Best-effort visual indicator for the Improv IDENTIFY command.
/// Failures are swallowed by the adapter; the protocol never reports them.
pub trait IndicatorPort {
    fn set_indicator(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Upstream port (domain → API subscribers)
// ───────────────────────────────────────────────────────────────

/// Delivers relay messages to individual subscribers.
pub trait UpstreamPort {
    fn send(&mut self, subscriber: SubscriberId, message: &UpstreamMessage) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], never clamped.
pub trait ConfigPort {
    /// Returns [`SystemConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// The `&'static str` names the field and the rule it broke.
    ValidationFailed(&'static str),
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
