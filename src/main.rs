//! Halo Firmware — Main Entry Point
//!
//! Single-threaded, event-driven main loop.  The BLE host runs on its own
//! task and talks to the loop only through the host event queue.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BleAdapter        WifiAdapter       GpioIndicator  ApiServer  │
//! │  (BleHostPort)     (Connectivity)    (Indicator)    (Upstream) │
//! │  NvsAdapter        AuthorizeButton   MonotonicClock            │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │                Dispatcher (pure logic)                 │    │
//! │  │  ImprovService (FSM) · AdvertisementRelay              │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  HOST_EVENTS (BLE task → main loop)                            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Result, anyhow};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{PinDriver, Pull};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;
use log::{info, warn};

use halo::adapters::api_server::ApiServer;
use halo::adapters::ble::{BleAdapter, HOST_EVENTS};
use halo::adapters::button::AuthorizeButton;
use halo::adapters::device_id;
use halo::adapters::indicator::GpioIndicator;
use halo::adapters::nvs::NvsAdapter;
use halo::adapters::time::MonotonicClock;
use halo::adapters::wifi::WifiAdapter;
use halo::app::dispatch::{Dispatcher, Ports};
use halo::app::ports::ConfigPort;
use halo::config::{SystemConfig, info_string};

/// Period of the Improv/relay tick.
const TICK_INTERVAL_MS: u64 = 20;
/// Main loop idle sleep.
const LOOP_SLEEP_MS: u32 = 5;
const STATS_INTERVAL_MS: u64 = 60_000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Halo v{}                          ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut config = match NvsAdapter::new().and_then(|nvs| nvs.load()) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    if let Err(e) = config.validate() {
        warn!("Stored config invalid ({}), using defaults", e);
        config = SystemConfig::default();
    }

    // ── 3. Device identity ────────────────────────────────────
    let mac = device_id::read_mac();
    let name = device_id::device_name("Halo", &mac);
    config.device.device_name = info_string(&name);
    info!("Device: {} (MAC {})", name, device_id::mac_pretty(&mac));
    match serde_json::to_string(&config) {
        Ok(json) => info!("Config: {}", json),
        Err(e) => warn!("Config dump failed: {}", e),
    }

    // ── 4. Construct adapters ─────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let (wifi_modem, _bt_modem) = peripherals.modem.split();
    let mut wifi = WifiAdapter::new(EspWifi::new(wifi_modem, sysloop, Some(nvs_partition))?);

    let mut indicator = GpioIndicator::new(PinDriver::output(peripherals.pins.gpio2)?, false);

    let mut button_pin = PinDriver::input(peripherals.pins.gpio0)?;
    button_pin.set_pull(Pull::Up)?;
    let mut button = AuthorizeButton::new(button_pin);

    let mut ble = BleAdapter::new(config.improv.advertised_name.clone());
    ble.init()?;

    let mut api = ApiServer::bind(config.relay.api_port, config.relay.max_subscribers)
        .map_err(|e| anyhow!("API server: {e}"))?;

    // ── 5. Domain ─────────────────────────────────────────────
    let mut dispatcher = Dispatcher::new(&config);
    let clock = MonotonicClock::new();

    info!("System ready. Entering event loop.");

    // ── 6. Event loop ─────────────────────────────────────────
    let mut last_tick = 0u64;
    let mut last_stats = 0u64;

    loop {
        let now_ms = clock.uptime_ms();
        let mut ports = Ports {
            ble: &mut ble,
            wifi: &mut wifi,
            indicator: &mut indicator,
            upstream: &mut api,
        };

        HOST_EVENTS.drain(|event| dispatcher.handle_host_event(event, now_ms, &mut ports));

        for event in ports.upstream.poll() {
            dispatcher.handle_upstream_event(event, &mut ports);
        }

        if button.poll(now_ms) && !dispatcher.authorize(now_ms, ports.ble) {
            info!("Authorize button ignored in {:?}", dispatcher.improv().state());
        }

        if now_ms.saturating_sub(last_tick) >= TICK_INTERVAL_MS {
            last_tick = now_ms;
            dispatcher.tick(now_ms, &mut ports);
        }

        if now_ms.saturating_sub(last_stats) >= STATS_INTERVAL_MS {
            last_stats = now_ms;
            let stats = dispatcher.relay().stats();
            info!(
                "Stats: improv={:?} scanner={:?} received={} flushes={} failures={} dropped_events={}",
                dispatcher.improv().state(),
                dispatcher.relay().scanner_state(),
                stats.received,
                stats.flushes,
                stats.delivery_failures,
                HOST_EVENTS.dropped()
            );
        }

        FreeRtos::delay_ms(LOOP_SLEEP_MS);
    }
}
