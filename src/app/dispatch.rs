//! Event routing between the host/upstream edges and the two components.
//!
//! [`Dispatcher`] owns [`ImprovService`] and [`AdvertisementRelay`] and
//! hands each event to the component that cares about it.  Adapters are
//! passed in explicitly on every call through [`Ports`], so there is no
//! process-wide instance pointer.
//!
//! ```text
//!   HostEventQueue ──▶ ┌────────────┐ ──▶ ImprovService
//!   UpstreamEvent ───▶ │ Dispatcher │
//!   tick ────────────▶ └────────────┘ ──▶ AdvertisementRelay
//! ```

use log::{debug, info, warn};

use crate::app::ports::{BleHostPort, ConnectivityPort, IndicatorPort, UpstreamPort};
use crate::app::service::ImprovService;
use crate::config::SystemConfig;
use crate::events::HostEvent;
use crate::improv::Characteristic;
use crate::relay::AdvertisementRelay;
use crate::relay::subscribers::SubscriberId;

/// Borrowed adapters for one dispatch call.
pub struct Ports<'a, B, W, I, U> {
    pub ble: &'a mut B,
    pub wifi: &'a mut W,
    pub indicator: &'a mut I,
    pub upstream: &'a mut U,
}

/// Requests arriving from upstream API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamEvent {
    Subscribed(SubscriberId),
    Unsubscribed(SubscriberId),
    ScannerModeRequested { subscriber: SubscriberId, active: bool },
}

pub struct Dispatcher {
    improv: ImprovService,
    relay: AdvertisementRelay,
}

impl Dispatcher {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            improv: ImprovService::new(config.improv.clone(), config.device.clone()),
            relay: AdvertisementRelay::new(config.relay),
        }
    }

    pub fn handle_host_event<B, W, I, U>(&mut self, event: HostEvent, now_ms: u64, ports: &mut Ports<'_, B, W, I, U>)
    where
        B: BleHostPort,
        W: ConnectivityPort,
        I: IndicatorPort,
        U: UpstreamPort,
    {
        match event {
            HostEvent::Synced => {
                info!("BLE host synced");
                self.improv.start(now_ms, ports.ble);
                self.relay.on_host_synced(ports.ble, ports.upstream);
            }
            HostEvent::Reset { reason } => {
                self.relay.on_host_reset(reason, ports.upstream);
            }
            HostEvent::Connected { conn } => self.improv.on_connect(conn, now_ms, ports.ble),
            HostEvent::ConnectFailed { status } => {
                warn!("BLE connection failed (status {}), restarting advertising", status);
                self.improv.resume_advertising(ports.ble);
            }
            HostEvent::Disconnected { conn, reason } => {
                self.improv.on_disconnect(conn, reason, now_ms, ports.ble);
            }
            HostEvent::AdvertisingComplete => self.improv.resume_advertising(ports.ble),
            HostEvent::ScanFailed { status } => self.relay.on_scan_failed(status, ports.upstream),
            HostEvent::Write { characteristic, data } => {
                if characteristic != Characteristic::RpcCommand {
                    debug!("Ignoring write to {}", characteristic.name());
                    return;
                }
                self.improv
                    .on_characteristic_write(&data, now_ms, ports.ble, ports.wifi, ports.indicator);
            }
            HostEvent::ScanResult(report) => self.relay.on_scan_result(report, now_ms, ports.upstream),
        }
    }

    pub fn handle_upstream_event<B, W, I, U>(&mut self, event: UpstreamEvent, ports: &mut Ports<'_, B, W, I, U>)
    where
        B: BleHostPort,
        W: ConnectivityPort,
        I: IndicatorPort,
        U: UpstreamPort,
    {
        match event {
            UpstreamEvent::Subscribed(id) => self.relay.add_subscriber(id, ports.upstream),
            UpstreamEvent::Unsubscribed(id) => self.relay.remove_subscriber(id),
            UpstreamEvent::ScannerModeRequested { subscriber, active } => {
                info!("{} requested scanning {}", subscriber, if active { "on" } else { "off" });
                self.relay.set_scanning(active, ports.ble, ports.upstream);
            }
        }
    }

    /// Periodic tick for both components.
    pub fn tick<B, W, I, U>(&mut self, now_ms: u64, ports: &mut Ports<'_, B, W, I, U>)
    where
        B: BleHostPort,
        W: ConnectivityPort,
        I: IndicatorPort,
        U: UpstreamPort,
    {
        self.improv.on_tick(now_ms, ports.ble, ports.wifi, ports.indicator);
        self.relay.on_tick(now_ms, ports.upstream);
    }

    /// External authorization signal, forwarded to the Improv service.
    pub fn authorize<B: BleHostPort>(&mut self, now_ms: u64, ble: &mut B) -> bool {
        self.improv.authorize(now_ms, ble)
    }

    pub fn improv(&self) -> &ImprovService {
        &self.improv
    }

    pub fn relay(&self) -> &AdvertisementRelay {
        &self.relay
    }
}
