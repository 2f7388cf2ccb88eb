//! End-to-end Improv sessions driven through `ImprovService` with mocks.

use std::net::Ipv4Addr;

use halo::app::ports::ConnHandle;
use halo::app::service::ImprovService;
use halo::config::{DeviceInfo, ImprovConfig};
use halo::fsm::ProvisioningState;
use halo::improv::codec::encode_wifi_settings;
use halo::improv::{Characteristic, ImprovError};

use crate::mock_ports::{BleCall, MockBle, MockIndicator, MockWifi};

const CONN: ConnHandle = ConnHandle(1);

struct Rig {
    svc: ImprovService,
    ble: MockBle,
    wifi: MockWifi,
    led: MockIndicator,
}

impl Rig {
    fn new(config: ImprovConfig, wifi: MockWifi) -> Self {
        let mut rig = Self {
            svc: ImprovService::new(config, DeviceInfo::default()),
            ble: MockBle::new(),
            wifi,
            led: MockIndicator::default(),
        };
        rig.svc.start(0, &mut rig.ble);
        rig
    }

    fn write(&mut self, data: &[u8], now: u64) {
        self.svc
            .on_characteristic_write(data, now, &mut self.ble, &mut self.wifi, &mut self.led);
    }

    fn tick(&mut self, now: u64) {
        self.svc.on_tick(now, &mut self.ble, &mut self.wifi, &mut self.led);
    }
}

fn creds(ssid: &str, password: &str) -> Vec<u8> {
    encode_wifi_settings(ssid, password).unwrap().to_vec()
}

#[test]
fn full_provisioning_session() {
    let mut rig = Rig::new(ImprovConfig::default(), MockWifi::new());
    assert_eq!(rig.svc.state(), ProvisioningState::AwaitingAuthorization);
    assert_eq!(rig.ble.count(&BleCall::StartAdvertising), 1);

    rig.svc.on_connect(CONN, 10, &mut rig.ble);
    assert_eq!(rig.svc.state(), ProvisioningState::Authorized);
    assert_eq!(rig.ble.notifications(Characteristic::Status), vec![vec![0x02]]);

    rig.write(&creds("Home", "secret123"), 20);
    assert_eq!(rig.svc.state(), ProvisioningState::Provisioning);
    assert_eq!(rig.wifi.attempts, vec![("Home".to_owned(), "secret123".to_owned())]);

    rig.tick(40);
    assert_eq!(rig.svc.state(), ProvisioningState::Provisioned);
    assert_eq!(
        rig.ble.notifications(Characteristic::Status),
        vec![vec![0x02], vec![0x03], vec![0x04]]
    );

    let mut expected = vec![0x01, 20];
    expected.extend_from_slice(b"http://192.168.1.50/");
    assert_eq!(rig.ble.notifications(Characteristic::RpcResult), vec![expected.clone()]);
    assert_eq!(rig.svc.read_characteristic(Characteristic::RpcResult).as_slice(), expected);
    assert_eq!(rig.svc.error(), ImprovError::None);
}

#[test]
fn unreachable_network_times_out_back_to_authorized() {
    let config = ImprovConfig {
        wifi_timeout_ms: 1_000,
        authorized_duration_ms: 60_000,
        ..ImprovConfig::default()
    };
    let mut rig = Rig::new(config, MockWifi::unreachable());
    rig.svc.on_connect(CONN, 0, &mut rig.ble);
    rig.write(&creds("Nowhere", "password1"), 100);

    rig.tick(500);
    assert_eq!(rig.svc.state(), ProvisioningState::Provisioning);

    rig.tick(1_100);
    assert_eq!(rig.svc.state(), ProvisioningState::Authorized);
    assert_eq!(rig.svc.error(), ImprovError::UnableToConnect);
    assert_eq!(rig.ble.value(Characteristic::Error), Some(vec![0x03]));
    assert!(rig.svc.pending_attempt().is_none());
    assert!(rig.ble.notifications(Characteristic::RpcResult).is_empty());
}

#[test]
fn error_persists_until_next_connect() {
    let mut rig = Rig::new(ImprovConfig::default(), MockWifi::new());
    rig.svc.on_connect(CONN, 0, &mut rig.ble);
    rig.write(&[0xAA, 0x00, 0x00], 10);
    assert_eq!(rig.svc.error(), ImprovError::UnknownRpc);

    // A valid command does not clear it.
    rig.write(&[0x02, 0x00, 0x00], 20);
    assert_eq!(rig.svc.error(), ImprovError::UnknownRpc);

    rig.svc.on_disconnect(CONN, 0x13, 30, &mut rig.ble);
    assert_eq!(rig.svc.error(), ImprovError::UnknownRpc);

    rig.svc.on_connect(ConnHandle(2), 40, &mut rig.ble);
    assert_eq!(rig.svc.error(), ImprovError::None);
    assert_eq!(rig.ble.value(Characteristic::Error), Some(vec![0x00]));
}

#[test]
fn unknown_command_is_never_notified() {
    let mut rig = Rig::new(ImprovConfig::default(), MockWifi::new());
    rig.svc.on_connect(CONN, 0, &mut rig.ble);
    rig.ble.clear();

    rig.write(&[0xAA, 0x00, 0x00], 10);
    assert!(rig
        .ble
        .calls
        .iter()
        .all(|c| !matches!(c, BleCall::Notify { .. })));
    assert_eq!(rig.ble.value(Characteristic::Error), Some(vec![0x02]));
}

#[test]
fn settings_before_authorization_are_rejected() {
    let config = ImprovConfig {
        require_authorization: true,
        ..ImprovConfig::default()
    };
    let mut rig = Rig::new(config, MockWifi::new());
    rig.svc.on_connect(CONN, 0, &mut rig.ble);
    assert_eq!(rig.svc.state(), ProvisioningState::AwaitingAuthorization);

    rig.write(&creds("Home", "secret123"), 10);
    assert_eq!(rig.svc.error(), ImprovError::NotAuthorized);
    assert!(rig.wifi.attempts.is_empty());

    assert!(rig.svc.authorize(20, &mut rig.ble));
    rig.write(&creds("Home", "secret123"), 30);
    assert_eq!(rig.svc.state(), ProvisioningState::Provisioning);
}

#[test]
fn authorization_grant_expires() {
    let config = ImprovConfig {
        require_authorization: true,
        authorized_duration_ms: 5_000,
        ..ImprovConfig::default()
    };
    let mut rig = Rig::new(config, MockWifi::new());
    rig.svc.on_connect(CONN, 0, &mut rig.ble);
    assert!(rig.svc.authorize(1_000, &mut rig.ble));

    rig.tick(5_999);
    assert_eq!(rig.svc.state(), ProvisioningState::Authorized);
    rig.tick(6_000);
    assert_eq!(rig.svc.state(), ProvisioningState::AwaitingAuthorization);
}

#[test]
fn identify_pulses_indicator_for_configured_duration() {
    let config = ImprovConfig {
        identify_duration_ms: 2_000,
        ..ImprovConfig::default()
    };
    let mut rig = Rig::new(config, MockWifi::new());
    rig.svc.on_connect(CONN, 0, &mut rig.ble);

    rig.write(&[0x02, 0x00, 0x00], 100);
    assert!(rig.led.is_on());
    assert!(rig.svc.is_identifying());

    rig.tick(2_000);
    assert!(rig.led.is_on());
    rig.tick(2_100);
    assert!(!rig.led.is_on());
    assert_eq!(rig.led.history, vec![true, false]);
}

#[test]
fn device_info_response_is_notified() {
    let mut rig = Rig::new(ImprovConfig::default(), MockWifi::new());
    rig.svc.on_connect(CONN, 0, &mut rig.ble);
    rig.write(&[0x03, 0x00, 0x00], 10);

    let responses = rig.ble.notifications(Characteristic::RpcResult);
    assert_eq!(responses.len(), 1);
    let frame = &responses[0];
    assert_eq!(frame[0], 0x03);
    let info = rig.svc.device_info();
    let first_len = frame[1] as usize;
    assert_eq!(&frame[2..2 + first_len], info.firmware_name.as_bytes());
}

#[test]
fn disconnect_mid_attempt_still_provisions() {
    let wifi = MockWifi {
        connect_after_polls: 3,
        ..MockWifi::new()
    };
    let mut rig = Rig::new(ImprovConfig::default(), wifi);
    rig.svc.on_connect(CONN, 0, &mut rig.ble);
    rig.write(&creds("Home", "secret123"), 10);

    rig.svc.on_disconnect(CONN, 0x13, 20, &mut rig.ble);
    assert_eq!(rig.svc.state(), ProvisioningState::AwaitingAuthorization);
    assert!(rig.svc.pending_attempt().is_some());
    assert_eq!(rig.ble.count(&BleCall::StartAdvertising), 2);

    rig.tick(40);
    rig.tick(60);
    rig.tick(80);
    assert_eq!(rig.svc.state(), ProvisioningState::Provisioned);
    // No client to notify; the result is still cached for reads.
    assert!(rig.ble.notifications(Characteristic::RpcResult).is_empty());
    assert_eq!(rig.svc.read_characteristic(Characteristic::RpcResult)[0], 0x01);
}

#[test]
fn stop_returns_to_stopped_and_ignores_connects() {
    let mut rig = Rig::new(ImprovConfig::default(), MockWifi::new());
    rig.svc.stop(10, &mut rig.ble);
    assert_eq!(rig.svc.state(), ProvisioningState::Stopped);
    assert_eq!(rig.ble.count(&BleCall::StopAdvertising), 1);

    rig.svc.on_connect(CONN, 20, &mut rig.ble);
    assert_eq!(rig.svc.state(), ProvisioningState::Stopped);
    rig.svc.resume_advertising(&mut rig.ble);
    assert_eq!(rig.ble.count(&BleCall::StartAdvertising), 1);
}

#[test]
fn reads_reflect_current_state() {
    let mut rig = Rig::new(ImprovConfig::default(), MockWifi::new());
    rig.svc.on_connect(CONN, 0, &mut rig.ble);
    assert_eq!(rig.svc.read_characteristic(Characteristic::Status).as_slice(), &[0x02]);
    assert_eq!(rig.svc.read_characteristic(Characteristic::Error).as_slice(), &[0x00]);
    assert_eq!(rig.svc.read_characteristic(Characteristic::Capabilities).as_slice(), &[0x00]);
    assert!(rig.svc.read_characteristic(Characteristic::RpcCommand).is_empty());
}

#[test]
fn home_network_session_notifies_redirect_url() {
    let wifi = MockWifi {
        address: Ipv4Addr::new(192, 0, 2, 5),
        ..MockWifi::new()
    };
    let mut rig = Rig::new(ImprovConfig::default(), wifi);
    rig.svc.on_connect(CONN, 0, &mut rig.ble);
    assert_eq!(rig.svc.state(), ProvisioningState::Authorized);

    let mut frame = vec![0x01, 4];
    frame.extend_from_slice(b"Home");
    frame.push(9);
    frame.extend_from_slice(b"secret123");
    rig.write(&frame, 10);
    assert_eq!(rig.svc.state(), ProvisioningState::Provisioning);

    rig.tick(30);
    assert_eq!(rig.svc.state(), ProvisioningState::Provisioned);

    let url = b"http://192.0.2.5/";
    let mut expected = vec![0x01, url.len() as u8];
    expected.extend_from_slice(url);
    assert_eq!(rig.ble.notifications(Characteristic::RpcResult), vec![expected]);
    assert_eq!(
        rig.ble.notifications(Characteristic::Status).last(),
        Some(&vec![ProvisioningState::Provisioned as u8])
    );
}

#[test]
fn writes_while_stopped_are_ignored() {
    let mut rig = Rig::new(ImprovConfig::default(), MockWifi::new());
    rig.svc.stop(5, &mut rig.ble);
    rig.ble.clear();

    rig.write(&creds("Home", "secret123"), 10);
    rig.write(&[0xAA, 0x00, 0x00], 20);
    rig.write(&[], 30);

    assert_eq!(rig.svc.state(), ProvisioningState::Stopped);
    assert_eq!(rig.svc.error(), ImprovError::None);
    assert!(rig.wifi.attempts.is_empty());
    assert!(rig.svc.pending_attempt().is_none());
    assert!(rig.ble.notifications(Characteristic::Status).is_empty());
}
