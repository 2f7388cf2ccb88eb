//! BLE advertisement relay.
//!
//! [`AdvertisementRelay`] owns one scan session, the bounded
//! [`AdvertisementBuffer`] and the [`SubscriberSet`].  Scan results are
//! appended in arrival order and flushed to every subscriber either when
//! the buffer fills or when [`FLUSH_INTERVAL_MS`] has passed since the last
//! flush.  Scanner state changes are reported to subscribers separately.
//!
//! Sightings are never deduplicated; downstream consumers do their own
//! liveness tracking.

pub mod buffer;
pub mod messages;
pub mod subscribers;

use log::{debug, error, info, warn};

use crate::app::ports::{BleHostPort, ScanParams, UpstreamPort};
use crate::config::{FLUSH_INTERVAL_MS, RelayConfig};

use buffer::AdvertisementBuffer;
use messages::{
    AddressType, AdvPayload, MAX_ADV_DATA, RawAdvertisement, ScannerState, ScannerStateReport,
    UpstreamMessage, pack_address,
};
use subscribers::{Insert, SubscriberId, SubscriberSet};

// ---------------------------------------------------------------------------
// Feature flags advertised to API clients
// ---------------------------------------------------------------------------

pub const FEATURE_PASSIVE_SCAN: u32 = 1 << 0;
pub const FEATURE_RAW_ADVERTISEMENTS: u32 = 1 << 5;
pub const FEATURE_STATE_AND_MODE: u32 = 1 << 6;

// ---------------------------------------------------------------------------
// Scan report (host → relay)
// ---------------------------------------------------------------------------

/// One scan result as delivered by the BLE host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Least significant byte first.
    pub address: [u8; 6],
    pub address_type: AddressType,
    pub rssi: i8,
    pub payload: AdvPayload,
}

impl ScanReport {
    /// Payloads longer than [`MAX_ADV_DATA`] are truncated.
    pub fn new(address: [u8; 6], address_type: AddressType, rssi: i8, payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_ADV_DATA);
        Self {
            address,
            address_type,
            rssi,
            payload: AdvPayload::from_slice(&payload[..len]).unwrap_or_default(),
        }
    }
}

/// Delivery counters since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub received: u32,
    pub flushes: u32,
    pub delivery_failures: u32,
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

pub struct AdvertisementRelay {
    config: RelayConfig,
    /// `None` when the buffer could not be reserved; the relay is disabled.
    buffer: Option<AdvertisementBuffer>,
    subscribers: SubscriberSet,
    state: ScannerState,
    host_ready: bool,
    /// Scanning requested by a subscriber at runtime.
    requested: bool,
    last_flush_ms: u64,
    stats: RelayStats,
}

impl AdvertisementRelay {
    pub fn new(config: RelayConfig) -> Self {
        let buffer = match AdvertisementBuffer::with_capacity(config.batch_capacity) {
            Ok(b) => Some(b),
            Err(e) => {
                error!("Relay disabled: {}", e);
                None
            }
        };
        Self {
            config,
            buffer,
            subscribers: SubscriberSet::new(config.max_subscribers),
            state: ScannerState::Idle,
            host_ready: false,
            requested: false,
            last_flush_ms: 0,
            stats: RelayStats::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.buffer.is_some()
    }

    // ── Host lifecycle ────────────────────────────────────────

    /// The BLE host is ready; start scanning if configured or requested.
    pub fn on_host_synced(&mut self, ble: &mut impl BleHostPort, upstream: &mut impl UpstreamPort) {
        self.host_ready = true;
        self.state = ScannerState::Stopped;
        if self.config.active || self.requested {
            self.set_scanning(true, ble, upstream);
        } else {
            self.report_state(upstream);
        }
    }

    /// The BLE host reset; any scan session is gone.
    pub fn on_host_reset(&mut self, reason: i32, upstream: &mut impl UpstreamPort) {
        warn!("Relay: BLE host reset (reason {}), scanner failed", reason);
        self.host_ready = false;
        self.state = ScannerState::Failed;
        self.report_state(upstream);
    }

    /// The host reported that a requested scan never started.  The next
    /// `set_scanning(true)` retries.
    pub fn on_scan_failed(&mut self, status: i32, upstream: &mut impl UpstreamPort) {
        if !matches!(self.state, ScannerState::Running | ScannerState::Starting) {
            debug!("Relay: scan failure (status {}) ignored in {:?}", status, self.state);
            return;
        }
        warn!("Relay: scan start failed in host (status {})", status);
        self.state = ScannerState::Failed;
        self.report_state(upstream);
    }

    // ── Data path ─────────────────────────────────────────────

    /// Buffer one sighting; the sighting that fills the buffer flushes it,
    /// so the buffer is never full on entry.
    pub fn on_scan_result(&mut self, report: ScanReport, now_ms: u64, upstream: &mut impl UpstreamPort) {
        let Some(buffer) = self.buffer.as_mut() else {
            return;
        };
        self.stats.received = self.stats.received.wrapping_add(1);
        let adv = RawAdvertisement {
            address: pack_address(&report.address),
            rssi: report.rssi,
            address_type: report.address_type,
            data: report.payload,
        };
        if buffer.push(adv).is_err() {
            debug!("Relay: buffer full, sighting dropped");
            return;
        }
        if buffer.is_full() {
            self.flush(now_ms, upstream);
        }
    }

    /// Time-based flush: a non-empty buffer waits at most [`FLUSH_INTERVAL_MS`].
    pub fn on_tick(&mut self, now_ms: u64, upstream: &mut impl UpstreamPort) {
        let pending = self.buffer.as_ref().is_some_and(|b| !b.is_empty());
        if pending && now_ms.saturating_sub(self.last_flush_ms) >= FLUSH_INTERVAL_MS {
            self.flush(now_ms, upstream);
        }
    }

    /// Send every buffered sighting as one batch to each subscriber.
    pub fn flush(&mut self, now_ms: u64, upstream: &mut impl UpstreamPort) {
        let Some(buffer) = self.buffer.as_mut() else {
            return;
        };
        if buffer.is_empty() {
            return;
        }
        let message = UpstreamMessage::Advertisements(buffer.take_batch());
        for id in self.subscribers.iter() {
            if let Err(e) = upstream.send(id, &message) {
                warn!("Relay: delivery to {} failed: {}", id, e);
                self.stats.delivery_failures = self.stats.delivery_failures.wrapping_add(1);
            }
        }
        self.stats.flushes = self.stats.flushes.wrapping_add(1);
        self.last_flush_ms = now_ms;
    }

    // ── Scanner control ───────────────────────────────────────

    /// Start or stop the scan session.
    ///
    /// A failed start leaves the scanner in `Starting` without a report;
    /// the caller retries on its next natural trigger.
    pub fn set_scanning(&mut self, enable: bool, ble: &mut impl BleHostPort, upstream: &mut impl UpstreamPort) {
        self.requested = enable;
        if !self.is_enabled() || !self.host_ready {
            debug!("Relay: scan request deferred (host ready: {})", self.host_ready);
            return;
        }

        if enable {
            if self.state == ScannerState::Running {
                return;
            }
            self.state = ScannerState::Starting;
            let params = ScanParams {
                mode: self.config.scan_mode,
                interval: self.config.scan_interval,
                window: self.config.scan_window,
                filter_duplicates: false,
            };
            if let Err(e) = ble.start_scan(&params) {
                warn!("Relay: {}", e);
                return;
            }
            info!("Relay: scanning ({:?})", self.config.scan_mode);
            self.state = ScannerState::Running;
        } else {
            if matches!(self.state, ScannerState::Running | ScannerState::Starting) {
                self.state = ScannerState::Stopping;
                if let Err(e) = ble.stop_scan() {
                    warn!("Relay: {}", e);
                }
            }
            info!("Relay: scanning stopped");
            self.state = ScannerState::Stopped;
        }
        self.report_state(upstream);
    }

    // ── Subscribers ───────────────────────────────────────────

    pub fn add_subscriber(&mut self, id: SubscriberId, upstream: &mut impl UpstreamPort) {
        match self.subscribers.insert(id) {
            Insert::AlreadyPresent => {
                debug!("Relay: {} already subscribed", id);
                return;
            }
            Insert::Replaced(old) => info!("Relay: {} replaces {}", id, old),
            Insert::Added => info!("Relay: {} subscribed", id),
        }
        if self.host_ready {
            if let Err(e) = upstream.send(id, &UpstreamMessage::ScannerState(self.state_report())) {
                warn!("Relay: delivery to {} failed: {}", id, e);
            }
        }
    }

    pub fn remove_subscriber(&mut self, id: SubscriberId) {
        if self.subscribers.remove(id) {
            info!("Relay: {} unsubscribed", id);
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn scanner_state(&self) -> ScannerState {
        self.state
    }

    pub fn state_report(&self) -> ScannerStateReport {
        ScannerStateReport {
            state: self.state,
            mode: self.config.scan_mode,
            configured_mode: self.config.scan_mode,
        }
    }

    pub fn feature_flags(&self) -> u32 {
        FEATURE_PASSIVE_SCAN | FEATURE_RAW_ADVERTISEMENTS | FEATURE_STATE_AND_MODE
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.as_ref().map_or(0, AdvertisementBuffer::len)
    }

    pub fn subscribers(&self) -> &SubscriberSet {
        &self.subscribers
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    fn report_state(&mut self, upstream: &mut impl UpstreamPort) {
        let message = UpstreamMessage::ScannerState(self.state_report());
        for id in self.subscribers.iter() {
            if let Err(e) = upstream.send(id, &message) {
                warn!("Relay: delivery to {} failed: {}", id, e);
                self.stats.delivery_failures = self.stats.delivery_failures.wrapping_add(1);
            }
        }
    }
}
