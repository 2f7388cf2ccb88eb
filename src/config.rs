//! System configuration parameters
//!
//! Everything tunable for the Improv provisioning service and the
//! advertisement relay.  Accepted at construction; nothing here changes
//! at runtime.  A persisted override may be loaded through
//! [`ConfigPort`](crate::app::ports::ConfigPort).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::relay::buffer::MAX_BATCH_CAPACITY;
use crate::relay::messages::ScannerMode;
use crate::relay::subscribers::MAX_SUBSCRIBERS;

/// Fixed interval after which a non-empty advertisement buffer is flushed.
pub const FLUSH_INTERVAL_MS: u64 = 100;

pub type InfoString = heapless::String<32>;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SystemConfig {
    pub improv: ImprovConfig,
    pub relay: RelayConfig,
    pub device: DeviceInfo,
}

/// Improv provisioning service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImprovConfig {
    /// Wait for an external authorization signal after connect
    pub require_authorization: bool,
    /// How long an authorization grant lasts (milliseconds)
    pub authorized_duration_ms: u32,
    /// How long the identify indicator stays on (milliseconds)
    pub identify_duration_ms: u32,
    /// How long a WiFi attempt may take before it fails (milliseconds)
    pub wifi_timeout_ms: u32,
    /// BLE local name while advertising the Improv service
    pub advertised_name: heapless::String<29>,
}

impl Default for ImprovConfig {
    fn default() -> Self {
        Self {
            require_authorization: false,
            authorized_duration_ms: 60_000, // 1 min
            identify_duration_ms: 10_000,   // 10 s
            wifi_timeout_ms: 60_000,        // 1 min
            advertised_name: heapless::String::try_from("Halo Improv").unwrap_or_default(),
        }
    }
}

/// Advertisement relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Start scanning as soon as the BLE host is ready
    pub active: bool,
    pub scan_mode: ScannerMode,
    /// Scan interval in 0.625 ms units
    pub scan_interval: u16,
    /// Scan window in 0.625 ms units
    pub scan_window: u16,
    /// Advertisements per batch before an immediate flush
    pub batch_capacity: usize,
    /// Upstream subscribers served at once
    pub max_subscribers: usize,
    /// TCP port of the upstream API server
    pub api_port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            active: true,
            scan_mode: ScannerMode::Active,
            scan_interval: 512, // 320 ms
            scan_window: 48,    // 30 ms
            batch_capacity: 5,
            max_subscribers: 3,
            api_port: 6053,
        }
    }
}

/// Identity reported by GET_DEVICE_INFO
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub firmware_name: InfoString,
    /// Build timestamp
    pub version: InfoString,
    pub hardware: InfoString,
    pub device_name: InfoString,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            firmware_name: info_string("halo"),
            version: info_string(option_env!("HALO_BUILD_TIME").unwrap_or(env!("CARGO_PKG_VERSION"))),
            hardware: info_string("ESP32-S3"),
            device_name: info_string("Halo"),
        }
    }
}

/// Truncating conversion; identity strings are informational.
pub fn info_string(s: &str) -> InfoString {
    let mut out = InfoString::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl SystemConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    ///
    /// Batch capacity above the buffer maximum is left to the relay, which
    /// disables itself with a resource error instead of refusing to boot.
    pub fn validate(&self) -> Result<()> {
        let i = &self.improv;
        if i.authorized_duration_ms == 0 {
            return Err(Error::Config("authorized_duration_ms must be > 0"));
        }
        if i.identify_duration_ms == 0 {
            return Err(Error::Config("identify_duration_ms must be > 0"));
        }
        if i.wifi_timeout_ms == 0 {
            return Err(Error::Config("wifi_timeout_ms must be > 0"));
        }
        if i.advertised_name.is_empty() {
            return Err(Error::Config("advertised_name must not be empty"));
        }

        let r = &self.relay;
        if r.batch_capacity == 0 {
            return Err(Error::Config("batch_capacity must be > 0"));
        }
        if !(1..=MAX_SUBSCRIBERS).contains(&r.max_subscribers) {
            return Err(Error::Config("max_subscribers must be 1-8"));
        }
        if r.scan_window > r.scan_interval {
            return Err(Error::Config("scan_window must not exceed scan_interval"));
        }
        Ok(())
    }

    /// Whether the configured batch fits the relay buffer.
    pub fn relay_buffer_fits(&self) -> bool {
        self.relay.batch_capacity <= MAX_BATCH_CAPACITY
    }
}
