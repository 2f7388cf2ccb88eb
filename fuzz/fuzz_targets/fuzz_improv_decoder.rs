//! Fuzz target: Improv RPC command decoding through `ImprovService`.
//!
//! Feeds arbitrary frames to a connected, authorized service and checks
//! that it never panics and that a rejected frame leaves the state alone.
//!
//! cargo fuzz run fuzz_improv_decoder

#![no_main]

use std::net::Ipv4Addr;

use halo::app::ports::{
    BleHostPort, ConnHandle, ConnectivityError, ConnectivityPort, IndicatorPort, ScanParams,
};
use halo::app::service::ImprovService;
use halo::config::{DeviceInfo, ImprovConfig};
use halo::error::TransportError;
use halo::improv::Characteristic;
use halo::improv::codec::decode_command;
use libfuzzer_sys::fuzz_target;

struct NullBle;

impl BleHostPort for NullBle {
    fn start_advertising(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
    fn stop_advertising(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
    fn start_scan(&mut self, _: &ScanParams) -> Result<(), TransportError> {
        Ok(())
    }
    fn stop_scan(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
    fn notify(&mut self, _: ConnHandle, _: Characteristic, _: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }
    fn set_value(&mut self, _: Characteristic, _: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }
}

struct NullWifi;

impl ConnectivityPort for NullWifi {
    fn start_connecting(&mut self, _: &str, _: &str) -> Result<(), ConnectivityError> {
        Ok(())
    }
    fn is_connected(&self) -> bool {
        false
    }
    fn ip_address(&self) -> Option<Ipv4Addr> {
        None
    }
}

struct NullIndicator;

impl IndicatorPort for NullIndicator {
    fn set_indicator(&mut self, _: bool) {}
}

fuzz_target!(|data: &[u8]| {
    let mut svc = ImprovService::new(ImprovConfig::default(), DeviceInfo::default());
    let mut ble = NullBle;
    svc.start(0, &mut ble);
    svc.on_connect(ConnHandle(1), 0, &mut ble);
    let before = svc.state();

    svc.on_characteristic_write(data, 1, &mut ble, &mut NullWifi, &mut NullIndicator);
    if decode_command(data).is_err() {
        assert_eq!(svc.state(), before);
    }
    svc.on_tick(2, &mut ble, &mut NullWifi, &mut NullIndicator);
});
