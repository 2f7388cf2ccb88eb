//! Host and upstream events routed through the `Dispatcher`.

use halo::app::dispatch::{Dispatcher, Ports, UpstreamEvent};
use halo::app::ports::ConnHandle;
use halo::config::SystemConfig;
use halo::events::{HostEvent, HostEventQueue, WriteData};
use halo::fsm::ProvisioningState;
use halo::improv::Characteristic;
use halo::improv::codec::encode_wifi_settings;
use halo::relay::ScanReport;
use halo::relay::messages::{AddressType, ScannerState};
use halo::relay::subscribers::SubscriberId;

use crate::mock_ports::{BleCall, MockBle, MockIndicator, MockUpstream, MockWifi};

struct Rig {
    dispatcher: Dispatcher,
    ble: MockBle,
    wifi: MockWifi,
    led: MockIndicator,
    up: MockUpstream,
}

impl Rig {
    fn new() -> Self {
        Self {
            dispatcher: Dispatcher::new(&SystemConfig::default()),
            ble: MockBle::new(),
            wifi: MockWifi::new(),
            led: MockIndicator::default(),
            up: MockUpstream::new(),
        }
    }

    fn host(&mut self, event: HostEvent, now: u64) {
        let mut ports = Ports {
            ble: &mut self.ble,
            wifi: &mut self.wifi,
            indicator: &mut self.led,
            upstream: &mut self.up,
        };
        self.dispatcher.handle_host_event(event, now, &mut ports);
    }

    fn upstream(&mut self, event: UpstreamEvent) {
        let mut ports = Ports {
            ble: &mut self.ble,
            wifi: &mut self.wifi,
            indicator: &mut self.led,
            upstream: &mut self.up,
        };
        self.dispatcher.handle_upstream_event(event, &mut ports);
    }

    fn tick(&mut self, now: u64) {
        let mut ports = Ports {
            ble: &mut self.ble,
            wifi: &mut self.wifi,
            indicator: &mut self.led,
            upstream: &mut self.up,
        };
        self.dispatcher.tick(now, &mut ports);
    }
}

fn write(characteristic: Characteristic, bytes: &[u8]) -> HostEvent {
    HostEvent::Write {
        characteristic,
        data: WriteData::from_slice(bytes).unwrap(),
    }
}

fn sighting(n: u8) -> HostEvent {
    HostEvent::ScanResult(ScanReport::new([n; 6], AddressType::Random, -70, &[n]))
}

#[test]
fn synced_starts_both_components() {
    let mut rig = Rig::new();
    assert_eq!(rig.dispatcher.improv().state(), ProvisioningState::Stopped);

    rig.host(HostEvent::Synced, 0);
    assert_eq!(rig.dispatcher.improv().state(), ProvisioningState::AwaitingAuthorization);
    assert_eq!(rig.dispatcher.relay().scanner_state(), ScannerState::Running);
    assert_eq!(rig.ble.count(&BleCall::StartAdvertising), 1);
    assert_eq!(rig.ble.scan_starts(), 1);
}

#[test]
fn provisioning_through_queued_events() {
    let mut rig = Rig::new();
    let queue = HostEventQueue::new();
    queue.push(HostEvent::Synced);
    queue.push(HostEvent::Connected { conn: ConnHandle(4) });
    queue.push(write(
        Characteristic::RpcCommand,
        &encode_wifi_settings("Home", "secret123").unwrap(),
    ));

    let mut events = Vec::new();
    queue.drain(|e| events.push(e));
    for event in events {
        rig.host(event, 10);
    }
    assert_eq!(rig.dispatcher.improv().state(), ProvisioningState::Provisioning);

    rig.tick(30);
    assert_eq!(rig.dispatcher.improv().state(), ProvisioningState::Provisioned);
    assert_eq!(rig.ble.notifications(Characteristic::RpcResult).len(), 1);
}

#[test]
fn writes_to_other_characteristics_are_ignored() {
    let mut rig = Rig::new();
    rig.host(HostEvent::Synced, 0);
    rig.host(HostEvent::Connected { conn: ConnHandle(1) }, 0);
    rig.host(write(Characteristic::Status, &[0x01, 0x00, 0x00]), 5);
    assert_eq!(rig.dispatcher.improv().state(), ProvisioningState::Authorized);
    assert!(rig.wifi.attempts.is_empty());
}

#[test]
fn advertising_restarts_after_completion_and_failed_connect() {
    let mut rig = Rig::new();
    rig.host(HostEvent::Synced, 0);
    rig.host(HostEvent::AdvertisingComplete, 10);
    rig.host(HostEvent::ConnectFailed { status: 0x3E }, 20);
    assert_eq!(rig.ble.count(&BleCall::StartAdvertising), 3);
}

#[test]
fn disconnect_restarts_advertising() {
    let mut rig = Rig::new();
    rig.host(HostEvent::Synced, 0);
    rig.host(HostEvent::Connected { conn: ConnHandle(1) }, 0);
    rig.host(
        HostEvent::Disconnected {
            conn: ConnHandle(1),
            reason: 0x13,
        },
        50,
    );
    assert_eq!(rig.dispatcher.improv().state(), ProvisioningState::AwaitingAuthorization);
    assert_eq!(rig.ble.count(&BleCall::StartAdvertising), 2);
}

#[test]
fn subscriber_receives_relayed_sightings() {
    let mut rig = Rig::new();
    rig.host(HostEvent::Synced, 0);
    rig.upstream(UpstreamEvent::Subscribed(SubscriberId(9)));
    assert_eq!(rig.up.state_reports_for(SubscriberId(9)), 1);

    for n in 0..5 {
        rig.host(sighting(n), 10);
    }
    assert_eq!(rig.up.batches_for(SubscriberId(9)).len(), 1);

    rig.host(sighting(5), 20);
    rig.tick(200);
    assert_eq!(rig.up.batches_for(SubscriberId(9)).len(), 2);

    rig.upstream(UpstreamEvent::Unsubscribed(SubscriberId(9)));
    for n in 0..5 {
        rig.host(sighting(n), 300);
    }
    assert_eq!(rig.up.batches_for(SubscriberId(9)).len(), 2);
}

#[test]
fn scanner_mode_request_toggles_scanning() {
    let mut rig = Rig::new();
    rig.host(HostEvent::Synced, 0);
    rig.upstream(UpstreamEvent::ScannerModeRequested {
        subscriber: SubscriberId(1),
        active: false,
    });
    assert_eq!(rig.dispatcher.relay().scanner_state(), ScannerState::Stopped);
    assert_eq!(rig.ble.count(&BleCall::StopScan), 1);

    rig.upstream(UpstreamEvent::ScannerModeRequested {
        subscriber: SubscriberId(1),
        active: true,
    });
    assert_eq!(rig.dispatcher.relay().scanner_state(), ScannerState::Running);
}

#[test]
fn host_reset_marks_scanner_failed() {
    let mut rig = Rig::new();
    rig.host(HostEvent::Synced, 0);
    rig.host(HostEvent::Reset { reason: 2 }, 5);
    assert_eq!(rig.dispatcher.relay().scanner_state(), ScannerState::Failed);
}

#[test]
fn host_scan_failure_is_reported_and_retried() {
    let mut rig = Rig::new();
    rig.host(HostEvent::Synced, 0);
    rig.upstream(UpstreamEvent::Subscribed(SubscriberId(3)));
    let reports = rig.up.state_reports_for(SubscriberId(3));

    rig.host(HostEvent::ScanFailed { status: 0x0C }, 5);
    assert_eq!(rig.dispatcher.relay().scanner_state(), ScannerState::Failed);
    assert_eq!(rig.up.state_reports_for(SubscriberId(3)), reports + 1);

    rig.upstream(UpstreamEvent::ScannerModeRequested {
        subscriber: SubscriberId(3),
        active: true,
    });
    assert_eq!(rig.dispatcher.relay().scanner_state(), ScannerState::Running);
    assert_eq!(rig.ble.scan_starts(), 2);
}

#[test]
fn button_authorization_goes_through_dispatcher() {
    let mut config = SystemConfig::default();
    config.improv.require_authorization = true;
    let mut dispatcher = Dispatcher::new(&config);
    let mut ble = MockBle::new();
    let mut wifi = MockWifi::new();
    let mut led = MockIndicator::default();
    let mut up = MockUpstream::new();
    let mut ports = Ports {
        ble: &mut ble,
        wifi: &mut wifi,
        indicator: &mut led,
        upstream: &mut up,
    };

    dispatcher.handle_host_event(HostEvent::Synced, 0, &mut ports);
    assert!(!dispatcher.authorize(1, ports.ble));

    dispatcher.handle_host_event(HostEvent::Connected { conn: ConnHandle(2) }, 2, &mut ports);
    assert!(dispatcher.authorize(3, ports.ble));
    assert_eq!(dispatcher.improv().state(), ProvisioningState::Authorized);
}
