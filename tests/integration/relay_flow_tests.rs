//! Advertisement relay scenarios: batching, timed flushes, scanner
//! lifecycle and subscriber churn.

use halo::app::ports::ScanParams;
use halo::config::RelayConfig;
use halo::relay::messages::{AddressType, ScannerMode, ScannerState, UpstreamMessage};
use halo::relay::subscribers::SubscriberId;
use halo::relay::{AdvertisementRelay, ScanReport};

use crate::mock_ports::{BleCall, MockBle, MockUpstream};

const SUB_A: SubscriberId = SubscriberId(1);
const SUB_B: SubscriberId = SubscriberId(2);

fn sighting(n: u8) -> ScanReport {
    ScanReport::new([n, 0x02, 0x03, 0x04, 0x05, 0x06], AddressType::Public, -60, &[0x02, 0x01, n])
}

fn running_relay(config: RelayConfig) -> (AdvertisementRelay, MockBle, MockUpstream) {
    let mut relay = AdvertisementRelay::new(config);
    let mut ble = MockBle::new();
    let mut up = MockUpstream::new();
    relay.on_host_synced(&mut ble, &mut up);
    relay.add_subscriber(SUB_A, &mut up);
    up.sent.clear();
    (relay, ble, up)
}

fn batch_len(message: &UpstreamMessage) -> usize {
    match message {
        UpstreamMessage::Advertisements(batch) => batch.len(),
        UpstreamMessage::ScannerState(_) => 0,
    }
}

#[test]
fn host_sync_starts_configured_scan() {
    let (relay, ble, _) = running_relay(RelayConfig::default());
    assert_eq!(relay.scanner_state(), ScannerState::Running);
    assert_eq!(
        ble.calls,
        vec![BleCall::StartScan(ScanParams {
            mode: ScannerMode::Active,
            interval: 512,
            window: 48,
            filter_duplicates: false,
        })]
    );
}

#[test]
fn five_sightings_make_one_batch() {
    let (mut relay, _, mut up) = running_relay(RelayConfig::default());
    for n in 0..5 {
        relay.on_scan_result(sighting(n), 10 + u64::from(n), &mut up);
    }
    let batches = up.batches_for(SUB_A);
    assert_eq!(batches.len(), 1);
    assert_eq!(batch_len(batches[0]), 5);
    assert_eq!(relay.buffered_len(), 0);

    // Arrival order and little-endian packing are preserved.
    let UpstreamMessage::Advertisements(batch) = batches[0] else {
        panic!("expected advertisements");
    };
    assert_eq!(batch[0].address, 0x0000_0605_0403_0200);
    assert_eq!(batch[4].address, 0x0000_0605_0403_0204);
    assert_eq!(batch[2].data.as_slice(), &[0x02, 0x01, 2]);
}

#[test]
fn partial_batch_flushes_after_interval() {
    let (mut relay, _, mut up) = running_relay(RelayConfig::default());
    // Fill once so the flush clock starts at 200.
    for n in 0..5 {
        relay.on_scan_result(sighting(n), 200, &mut up);
    }
    relay.on_scan_result(sighting(9), 210, &mut up);
    relay.on_scan_result(sighting(10), 220, &mut up);

    relay.on_tick(299, &mut up);
    assert_eq!(up.batches_for(SUB_A).len(), 1);
    assert_eq!(relay.buffered_len(), 2);

    relay.on_tick(300, &mut up);
    let batches = up.batches_for(SUB_A);
    assert_eq!(batches.len(), 2);
    assert_eq!(batch_len(batches[1]), 2);
}

#[test]
fn empty_buffer_never_flushes() {
    let (mut relay, _, mut up) = running_relay(RelayConfig::default());
    relay.on_tick(1_000, &mut up);
    relay.on_tick(5_000, &mut up);
    assert!(up.sent.is_empty());
    assert_eq!(relay.stats().flushes, 0);
}

#[test]
fn every_subscriber_gets_every_batch() {
    let (mut relay, _, mut up) = running_relay(RelayConfig::default());
    relay.add_subscriber(SUB_B, &mut up);
    for n in 0..5 {
        relay.on_scan_result(sighting(n), 10, &mut up);
    }
    assert_eq!(up.batches_for(SUB_A).len(), 1);
    assert_eq!(up.batches_for(SUB_B).len(), 1);
    assert_eq!(up.state_reports_for(SUB_B), 1);
}

#[test]
fn failing_subscriber_does_not_block_others() {
    let (mut relay, _, mut up) = running_relay(RelayConfig::default());
    relay.add_subscriber(SUB_B, &mut up);
    up.failing.insert(SUB_A);
    for n in 0..5 {
        relay.on_scan_result(sighting(n), 10, &mut up);
    }
    assert!(up.batches_for(SUB_A).is_empty());
    assert_eq!(up.batches_for(SUB_B).len(), 1);
    assert_eq!(relay.stats().delivery_failures, 1);
    assert_eq!(relay.stats().received, 5);
}

#[test]
fn removed_subscriber_stops_receiving() {
    let (mut relay, _, mut up) = running_relay(RelayConfig::default());
    relay.remove_subscriber(SUB_A);
    relay.remove_subscriber(SUB_A);
    for n in 0..5 {
        relay.on_scan_result(sighting(n), 10, &mut up);
    }
    assert!(up.sent.is_empty());
    // Batch is still taken, even with nobody listening.
    assert_eq!(relay.buffered_len(), 0);
}

#[test]
fn host_reset_fails_scanner_and_resync_restarts() {
    let (mut relay, mut ble, mut up) = running_relay(RelayConfig::default());
    relay.on_host_reset(0x13, &mut up);
    assert_eq!(relay.scanner_state(), ScannerState::Failed);
    assert_eq!(up.state_reports_for(SUB_A), 1);

    relay.on_host_synced(&mut ble, &mut up);
    assert_eq!(relay.scanner_state(), ScannerState::Running);
    assert_eq!(ble.scan_starts(), 2);
}

#[test]
fn stop_reports_stopped() {
    let (mut relay, mut ble, mut up) = running_relay(RelayConfig::default());
    relay.set_scanning(false, &mut ble, &mut up);
    assert_eq!(relay.scanner_state(), ScannerState::Stopped);
    assert_eq!(ble.count(&BleCall::StopScan), 1);
    let UpstreamMessage::ScannerState(report) = &up.sent[0].1 else {
        panic!("expected scanner state");
    };
    assert_eq!(report.state, ScannerState::Stopped);
}

#[test]
fn failed_scan_start_stays_starting() {
    let mut relay = AdvertisementRelay::new(RelayConfig::default());
    let mut ble = MockBle {
        fail_scan_start: true,
        ..MockBle::new()
    };
    let mut up = MockUpstream::new();
    relay.add_subscriber(SUB_A, &mut up);
    relay.on_host_synced(&mut ble, &mut up);
    assert_eq!(relay.scanner_state(), ScannerState::Starting);
    assert!(up.sent.is_empty());
}

#[test]
fn inactive_config_waits_for_request() {
    let config = RelayConfig {
        active: false,
        ..RelayConfig::default()
    };
    let mut relay = AdvertisementRelay::new(config);
    let mut ble = MockBle::new();
    let mut up = MockUpstream::new();
    relay.on_host_synced(&mut ble, &mut up);
    assert_eq!(relay.scanner_state(), ScannerState::Stopped);
    assert_eq!(ble.scan_starts(), 0);

    relay.set_scanning(true, &mut ble, &mut up);
    assert_eq!(relay.scanner_state(), ScannerState::Running);
}

#[test]
fn oversized_batch_disables_relay() {
    let config = RelayConfig {
        batch_capacity: 64,
        ..RelayConfig::default()
    };
    let mut relay = AdvertisementRelay::new(config);
    let mut ble = MockBle::new();
    let mut up = MockUpstream::new();
    assert!(!relay.is_enabled());

    relay.on_host_synced(&mut ble, &mut up);
    relay.add_subscriber(SUB_A, &mut up);
    relay.on_scan_result(sighting(1), 10, &mut up);
    assert_eq!(ble.scan_starts(), 0);
    assert_eq!(relay.buffered_len(), 0);
    assert_eq!(relay.stats().received, 0);
}

#[test]
fn long_payload_is_truncated() {
    let report = ScanReport::new([0; 6], AddressType::Random, -90, &[0xAB; 100]);
    assert_eq!(report.payload.len(), 62);
}
