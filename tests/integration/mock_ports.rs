//! Mock port adapters for integration tests.
//!
//! Records every port call so tests can assert on the full history
//! without a radio, an access point or a socket.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use halo::app::ports::{
    BleHostPort, ConnHandle, ConnectivityError, ConnectivityPort, IndicatorPort, ScanParams, UpstreamPort,
};
use halo::error::TransportError;
use halo::improv::Characteristic;
use halo::relay::messages::UpstreamMessage;
use halo::relay::subscribers::SubscriberId;

// ── BLE host ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum BleCall {
    StartAdvertising,
    StopAdvertising,
    StartScan(ScanParams),
    StopScan,
    Notify { conn: ConnHandle, characteristic: Characteristic, data: Vec<u8> },
    SetValue { characteristic: Characteristic, data: Vec<u8> },
}

#[derive(Default)]
pub struct MockBle {
    pub calls: Vec<BleCall>,
    pub fail_scan_start: bool,
}

#[allow(dead_code)]
impl MockBle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self, characteristic: Characteristic) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                BleCall::Notify { characteristic: ch, data, .. } if *ch == characteristic => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Last value written to the read cache for `characteristic`.
    pub fn value(&self, characteristic: Characteristic) -> Option<Vec<u8>> {
        self.calls.iter().rev().find_map(|c| match c {
            BleCall::SetValue { characteristic: ch, data } if *ch == characteristic => Some(data.clone()),
            _ => None,
        })
    }

    pub fn count(&self, call: &BleCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn scan_starts(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, BleCall::StartScan(_))).count()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl BleHostPort for MockBle {
    fn start_advertising(&mut self) -> Result<(), TransportError> {
        self.calls.push(BleCall::StartAdvertising);
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), TransportError> {
        self.calls.push(BleCall::StopAdvertising);
        Ok(())
    }

    fn start_scan(&mut self, params: &ScanParams) -> Result<(), TransportError> {
        self.calls.push(BleCall::StartScan(*params));
        if self.fail_scan_start {
            return Err(TransportError::ScanStart(-1));
        }
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), TransportError> {
        self.calls.push(BleCall::StopScan);
        Ok(())
    }

    fn notify(&mut self, conn: ConnHandle, characteristic: Characteristic, data: &[u8]) -> Result<(), TransportError> {
        self.calls.push(BleCall::Notify {
            conn,
            characteristic,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn set_value(&mut self, characteristic: Characteristic, data: &[u8]) -> Result<(), TransportError> {
        self.calls.push(BleCall::SetValue {
            characteristic,
            data: data.to_vec(),
        });
        Ok(())
    }
}

// ── WiFi ──────────────────────────────────────────────────────

/// Comes up `connect_after_polls` polls after an attempt starts, unless
/// `unreachable` is set.
pub struct MockWifi {
    pub attempts: Vec<(String, String)>,
    pub connect_after_polls: u32,
    pub unreachable: bool,
    pub address: Ipv4Addr,
    pub polls: u32,
    pub connected: bool,
}

impl Default for MockWifi {
    fn default() -> Self {
        Self {
            attempts: Vec::new(),
            connect_after_polls: 1,
            unreachable: false,
            address: Ipv4Addr::new(192, 168, 1, 50),
            polls: 0,
            connected: false,
        }
    }
}

#[allow(dead_code)]
impl MockWifi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }
}

impl ConnectivityPort for MockWifi {
    fn start_connecting(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        if ssid.is_empty() {
            return Err(ConnectivityError::InvalidSsid);
        }
        self.attempts.push((ssid.to_owned(), password.to_owned()));
        self.polls = 0;
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn ip_address(&self) -> Option<Ipv4Addr> {
        self.connected.then_some(self.address)
    }

    fn poll(&mut self) {
        if self.unreachable || self.connected {
            return;
        }
        self.polls += 1;
        if self.polls >= self.connect_after_polls {
            self.connected = true;
        }
    }
}

// ── Indicator ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockIndicator {
    pub history: Vec<bool>,
}

#[allow(dead_code)]
impl MockIndicator {
    pub fn is_on(&self) -> bool {
        self.history.last().copied().unwrap_or(false)
    }
}

impl IndicatorPort for MockIndicator {
    fn set_indicator(&mut self, on: bool) {
        self.history.push(on);
    }
}

// ── Upstream ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockUpstream {
    pub sent: Vec<(SubscriberId, UpstreamMessage)>,
    pub failing: HashSet<SubscriberId>,
}

#[allow(dead_code)]
impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertisement batches delivered to `id`, in order.
    pub fn batches_for(&self, id: SubscriberId) -> Vec<&UpstreamMessage> {
        self.sent
            .iter()
            .filter(|(to, m)| *to == id && matches!(m, UpstreamMessage::Advertisements(_)))
            .map(|(_, m)| m)
            .collect()
    }

    pub fn state_reports_for(&self, id: SubscriberId) -> usize {
        self.sent
            .iter()
            .filter(|(to, m)| *to == id && matches!(m, UpstreamMessage::ScannerState(_)))
            .count()
    }
}

impl UpstreamPort for MockUpstream {
    fn send(&mut self, subscriber: SubscriberId, message: &UpstreamMessage) -> Result<(), TransportError> {
        if self.failing.contains(&subscriber) {
            return Err(TransportError::Send);
        }
        self.sent.push((subscriber, message.clone()));
        Ok(())
    }
}
