//! BLE host adapter.
//!
//! Implements [`BleHostPort`]: the Improv GATT server, connectable
//! advertising and the observer scan that feeds the relay.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GAP + GATTS through raw
//!   `esp_idf_svc::sys` calls.
//! - **all other targets**: simulation that records what was asked of it.
//!
//! ## Event flow
//!
//! Bluedroid callbacks are C function pointers that run on the Bluedroid
//! task.  They never touch component state: connect, disconnect, writes
//! and scan results are converted to [`HostEvent`]s and pushed into
//! [`HOST_EVENTS`], which the main loop drains.  Reads are answered in the
//! callback itself from [`VALUE_CACHE`], which the core keeps current via
//! [`BleHostPort::set_value`].
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID suffix | Perms        |
//! |----------------|-------------|--------------|
//! | Status         | `…8001`     | Read+Notify  |
//! | Error          | `…8002`     | Read         |
//! | RPC command    | `…8003`     | Write        |
//! | RPC result     | `…8004`     | Read+Notify  |
//! | Capabilities   | `…8005`     | Read         |

use std::sync::Mutex;

use log::info;

use crate::app::ports::{BleHostPort, ConnHandle, ScanParams};
use crate::error::TransportError;
use crate::events::{HostEvent, HostEventQueue};
use crate::improv::codec::MAX_RESPONSE_LEN;
use crate::improv::{CAPABILITIES, Characteristic, SERVICE_UUID};
#[cfg(target_os = "espidf")]
use crate::relay::messages::ScannerMode;

// ───────────────────────────────────────────────────────────────
// Shared state bridging host callbacks and the main loop
// ───────────────────────────────────────────────────────────────

/// Events from the BLE host task, drained by the main loop.
pub static HOST_EVENTS: HostEventQueue = HostEventQueue::new();

pub type CachedValue = heapless::Vec<u8, MAX_RESPONSE_LEN>;

/// Values served for characteristic reads, indexed by `Characteristic as usize`.
pub static VALUE_CACHE: Mutex<[CachedValue; Characteristic::COUNT]> =
    Mutex::new([const { CachedValue::new() }; Characteristic::COUNT]);

fn cache_store(characteristic: Characteristic, data: &[u8]) -> Result<(), TransportError> {
    let value = CachedValue::from_slice(data).map_err(|()| TransportError::SetValue(data.len() as i32))?;
    let mut cache = VALUE_CACHE.lock().map_err(|_| TransportError::SetValue(-1))?;
    cache[characteristic as usize] = value;
    Ok(())
}

/// Current cached value of `characteristic` (empty if never set).
pub fn cached_value(characteristic: Characteristic) -> CachedValue {
    VALUE_CACHE
        .lock()
        .map(|cache| cache[characteristic as usize].clone())
        .unwrap_or_default()
}

/// Raw advertising payload: flags plus the complete 128-bit Improv UUID.
pub fn advertising_data() -> heapless::Vec<u8, 31> {
    let mut adv = heapless::Vec::new();
    // Fits: 3 + 18 bytes.
    let _ = adv.extend_from_slice(&[0x02, 0x01, 0x06, 0x11, 0x07]);
    let _ = adv.extend_from_slice(&SERVICE_UUID.to_le_bytes());
    adv
}

/// Scan response payload: complete local name, cut to fit.
pub fn scan_response_data(name: &str) -> heapless::Vec<u8, 31> {
    let bytes = &name.as_bytes()[..name.len().min(29)];
    let mut rsp = heapless::Vec::new();
    let _ = rsp.push(bytes.len() as u8 + 1);
    let _ = rsp.push(0x09);
    let _ = rsp.extend_from_slice(bytes);
    rsp
}

/// HCI status: connection failed to be established.
const CONN_FAIL_ESTABLISH: i32 = 0x3E;
/// Failed advertising starts re-posted before waiting for the next trigger.
const MAX_ADV_RETRIES: u32 = 3;

/// Event for a link-layer disconnect.  A failed establishment on a link
/// that was never reported as connected is a failed connect.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn disconnect_event(conn: ConnHandle, reason: i32, connected: Option<ConnHandle>) -> HostEvent {
    if reason == CONN_FAIL_ESTABLISH && connected != Some(conn) {
        HostEvent::ConnectFailed { status: reason }
    } else {
        HostEvent::Disconnected { conn, reason }
    }
}

/// Whether the `failures`-th consecutive advertising start failure is retried.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn retry_advertising(failures: u32) -> bool {
    failures <= MAX_ADV_RETRIES
}

// ── ESP-IDF BLE static state (ISR-safe atomics) ───────────────

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
/// Index into [`ATTRIBUTE_PLAN`] of the attribute being registered.
#[cfg(target_os = "espidf")]
static BLE_ATTR_STEP: AtomicU32 = AtomicU32::new(0);
/// Attribute handles, indexed like [`ATTRIBUTE_PLAN`].
#[cfg(target_os = "espidf")]
static BLE_ATTR_HANDLES: [AtomicU32; ATTRIBUTE_PLAN.len()] =
    [const { AtomicU32::new(0) }; ATTRIBUTE_PLAN.len()];
#[cfg(target_os = "espidf")]
static BLE_ADV_READY: AtomicBool = AtomicBool::new(false);
#[cfg(target_os = "espidf")]
static BLE_ADV_WANTED: AtomicBool = AtomicBool::new(false);
/// Consecutive advertising start failures.
#[cfg(target_os = "espidf")]
static BLE_ADV_FAILURES: AtomicU32 = AtomicU32::new(0);
/// Connection id reported by the last connect, or [`NO_CONN`].
#[cfg(target_os = "espidf")]
static BLE_CONN_ID: AtomicU32 = AtomicU32::new(NO_CONN);
#[cfg(target_os = "espidf")]
const NO_CONN: u32 = u32::MAX;

#[cfg(target_os = "espidf")]
#[derive(Clone, Copy)]
enum Attribute {
    Char(Characteristic),
    /// Client configuration descriptor of the preceding characteristic.
    Cccd,
}

#[cfg(target_os = "espidf")]
const ATTRIBUTE_PLAN: [Attribute; 7] = [
    Attribute::Char(Characteristic::Status),
    Attribute::Cccd,
    Attribute::Char(Characteristic::Error),
    Attribute::Char(Characteristic::RpcCommand),
    Attribute::Char(Characteristic::RpcResult),
    Attribute::Cccd,
    Attribute::Char(Characteristic::Capabilities),
];

/// Service declaration + 5 × (declaration, value) + 2 CCCDs, with headroom.
#[cfg(target_os = "espidf")]
const SERVICE_HANDLES: u16 = 16;

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    unsafe {
        t.uuid.uuid128 = uuid.to_le_bytes();
    }
    t
}

#[cfg(target_os = "espidf")]
fn uuid16_to_esp(uuid: u16) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 2;
    t.uuid.uuid16 = uuid;
    t
}

#[cfg(target_os = "espidf")]
unsafe fn add_attribute(svc_handle: u16, attribute: Attribute) {
    use esp_idf_svc::sys::*;
    match attribute {
        Attribute::Char(ch) => {
            let mut perm = 0;
            let mut prop = 0;
            if ch.is_readable() {
                perm |= ESP_GATT_PERM_READ;
                prop |= ESP_GATT_CHAR_PROP_BIT_READ;
            }
            if ch.is_writable() {
                perm |= ESP_GATT_PERM_WRITE;
                prop |= ESP_GATT_CHAR_PROP_BIT_WRITE;
            }
            if ch.is_notifiable() {
                prop |= ESP_GATT_CHAR_PROP_BIT_NOTIFY;
            }
            let mut uuid = uuid128_to_esp(ch.uuid());
            // Null value/control: every access is answered by the app.
            esp_ble_gatts_add_char(
                svc_handle,
                &mut uuid,
                perm as esp_gatt_perm_t,
                prop as esp_gatt_char_prop_t,
                core::ptr::null_mut(),
                core::ptr::null_mut(),
            );
        }
        Attribute::Cccd => {
            let mut uuid = uuid16_to_esp(ESP_GATT_UUID_CHAR_CLIENT_CONFIG as u16);
            esp_ble_gatts_add_char_descr(
                svc_handle,
                &mut uuid,
                (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                core::ptr::null_mut(),
                core::ptr::null_mut(),
            );
        }
    }
}

#[cfg(target_os = "espidf")]
fn characteristic_for_handle(handle: u16) -> Option<Characteristic> {
    ATTRIBUTE_PLAN
        .iter()
        .zip(BLE_ATTR_HANDLES.iter())
        .find_map(|(attr, h)| match attr {
            Attribute::Char(ch) if h.load(AtomicOrdering::Relaxed) == u32::from(handle) => Some(*ch),
            _ => None,
        })
}

#[cfg(target_os = "espidf")]
fn handle_for(characteristic: Characteristic) -> u16 {
    ATTRIBUTE_PLAN
        .iter()
        .zip(BLE_ATTR_HANDLES.iter())
        .find_map(|(attr, h)| match attr {
            Attribute::Char(ch) if *ch == characteristic => Some(h.load(AtomicOrdering::Relaxed) as u16),
            _ => None,
        })
        .unwrap_or(0)
}

#[cfg(target_os = "espidf")]
unsafe fn start_advertising_raw() -> i32 {
    use esp_idf_svc::sys::*;
    let mut adv_params = esp_ble_adv_params_t {
        adv_int_min: 0x20,
        adv_int_max: 0x40,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        ..core::mem::zeroed()
    };
    esp_ble_gap_start_advertising(&mut adv_params)
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use crate::relay::ScanReport;
    use crate::relay::messages::AddressType;
    use esp_idf_svc::sys::*;

    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_RSP_DATA_RAW_SET_COMPLETE_EVT => {
            BLE_ADV_READY.store(true, AtomicOrdering::Release);
            if BLE_ADV_WANTED.load(AtomicOrdering::Acquire) {
                start_advertising_raw();
            }
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            let status = (*param).adv_start_cmpl.status;
            if status == esp_bt_status_t_ESP_BT_STATUS_SUCCESS {
                BLE_ADV_FAILURES.store(0, AtomicOrdering::Relaxed);
                log::info!("BLE GAP: advertising started");
            } else {
                let failures = BLE_ADV_FAILURES.fetch_add(1, AtomicOrdering::Relaxed) + 1;
                log::warn!("BLE GAP: advertising start failed (status={}, attempt {})", status, failures);
                if retry_advertising(failures) {
                    HOST_EVENTS.push(HostEvent::AdvertisingComplete);
                }
            }
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising stopped");
            // Stopped without being asked to.
            if BLE_ADV_WANTED.load(AtomicOrdering::Acquire) {
                HOST_EVENTS.push(HostEvent::AdvertisingComplete);
            }
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_PARAM_SET_COMPLETE_EVT => {
            let status = (*param).scan_param_cmpl.status;
            if status != esp_bt_status_t_ESP_BT_STATUS_SUCCESS {
                log::warn!("BLE GAP: scan parameters rejected (status={})", status);
                HOST_EVENTS.push(HostEvent::ScanFailed { status: status as i32 });
                return;
            }
            // 0 = scan until stopped.
            let rc = esp_ble_gap_start_scanning(0);
            if rc != ESP_OK {
                HOST_EVENTS.push(HostEvent::ScanFailed { status: rc });
            }
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_START_COMPLETE_EVT => {
            let status = (*param).scan_start_cmpl.status;
            if status != esp_bt_status_t_ESP_BT_STATUS_SUCCESS {
                log::warn!("BLE GAP: scan start failed (status={})", status);
                HOST_EVENTS.push(HostEvent::ScanFailed { status: status as i32 });
            }
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_RESULT_EVT => {
            let p = &(*param).scan_rst;
            if p.search_evt != esp_gap_search_evt_t_ESP_GAP_SEARCH_INQ_RES_EVT {
                return;
            }
            // Bluedroid addresses are most-significant byte first.
            let mut address = p.bda;
            address.reverse();
            let len = usize::from(p.adv_data_len) + usize::from(p.scan_rsp_len);
            let payload = &p.ble_adv[..len.min(p.ble_adv.len())];
            let rssi = p.rssi.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8;
            HOST_EVENTS.push(HostEvent::ScanResult(ScanReport::new(
                address,
                AddressType::from_raw(p.ble_addr_type as u8),
                rssi,
                payload,
            )));
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use crate::events::WriteData;
    use esp_idf_svc::sys::*;

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            let status = (*param).reg.status;
            if status != esp_gatt_status_t_ESP_GATT_OK {
                log::error!("BLE GATTS: app registration failed (status={})", status);
                HOST_EVENTS.push(HostEvent::Reset { reason: status as i32 });
                return;
            }
            BLE_GATTS_IF.store(u32::from(gatts_if), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: app registered (if={})", gatts_if);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: uuid128_to_esp(SERVICE_UUID),
                    inst_id: 0,
                },
                is_primary: true,
            };
            esp_ble_gatts_create_service(gatts_if, &mut svc_id, SERVICE_HANDLES);
        }
        esp_gatts_cb_event_t_ESP_GATTS_UNREG_EVT => {
            log::warn!("BLE GATTS: app unregistered");
            HOST_EVENTS.push(HostEvent::Reset { reason: 0 });
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let status = (*param).create.status;
            if status != esp_gatt_status_t_ESP_GATT_OK {
                log::error!("BLE GATTS: service creation failed (status={})", status);
                HOST_EVENTS.push(HostEvent::Reset { reason: status as i32 });
                return;
            }
            let svc_handle = (*param).create.service_handle;
            BLE_SVC_HANDLE.store(u32::from(svc_handle), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: service created (handle={})", svc_handle);
            esp_ble_gatts_start_service(svc_handle);
            BLE_ATTR_STEP.store(0, AtomicOrdering::Relaxed);
            add_attribute(svc_handle, ATTRIBUTE_PLAN[0]);
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT | esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
            let (status, handle) = if event == esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT {
                ((*param).add_char.status, (*param).add_char.attr_handle)
            } else {
                ((*param).add_char_descr.status, (*param).add_char_descr.attr_handle)
            };
            if status != esp_gatt_status_t_ESP_GATT_OK {
                log::error!("BLE GATTS: attribute registration failed (status={})", status);
                HOST_EVENTS.push(HostEvent::Reset { reason: status as i32 });
                return;
            }
            let step = BLE_ATTR_STEP.load(AtomicOrdering::Relaxed) as usize;
            let Some(slot) = BLE_ATTR_HANDLES.get(step) else {
                return;
            };
            slot.store(u32::from(handle), AtomicOrdering::Relaxed);
            let next = step + 1;
            BLE_ATTR_STEP.store(next as u32, AtomicOrdering::Relaxed);
            if let Some(attr) = ATTRIBUTE_PLAN.get(next) {
                add_attribute(BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed) as u16, *attr);
            } else {
                log::info!("BLE GATTS: Improv service registered ({} attributes)", next);
                HOST_EVENTS.push(HostEvent::Synced);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let p = &(*param).connect;
            log::info!("BLE GATTS: client connected (conn_id={})", p.conn_id);
            BLE_CONN_ID.store(u32::from(p.conn_id), AtomicOrdering::Relaxed);
            HOST_EVENTS.push(HostEvent::Connected {
                conn: ConnHandle(p.conn_id),
            });
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            let p = &(*param).disconnect;
            log::info!("BLE GATTS: client disconnected (reason={})", p.reason);
            let connected = match BLE_CONN_ID.swap(NO_CONN, AtomicOrdering::Relaxed) {
                NO_CONN => None,
                id => Some(ConnHandle(id as u16)),
            };
            HOST_EVENTS.push(disconnect_event(ConnHandle(p.conn_id), p.reason as i32, connected));
        }
        esp_gatts_cb_event_t_ESP_GATTS_READ_EVT => {
            let p = &(*param).read;
            let value = characteristic_for_handle(p.handle).map(cached_value).unwrap_or_default();
            let offset = usize::from(p.offset).min(value.len());
            let mut rsp: esp_gatt_rsp_t = core::mem::zeroed();
            let chunk = &value[offset..];
            rsp.attr_value.handle = p.handle;
            rsp.attr_value.len = chunk.len() as u16;
            rsp.attr_value.value[..chunk.len()].copy_from_slice(chunk);
            esp_ble_gatts_send_response(gatts_if, p.conn_id, p.trans_id, esp_gatt_status_t_ESP_GATT_OK, &mut rsp);
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = &(*param).write;
            let data = core::slice::from_raw_parts(p.value, usize::from(p.len));
            if let Some(characteristic) = characteristic_for_handle(p.handle) {
                let mut buf = WriteData::new();
                let _ = buf.extend_from_slice(&data[..data.len().min(buf.capacity())]);
                HOST_EVENTS.push(HostEvent::Write {
                    characteristic,
                    data: buf,
                });
            }
            if p.need_rsp {
                esp_ble_gatts_send_response(
                    gatts_if,
                    p.conn_id,
                    p.trans_id,
                    esp_gatt_status_t_ESP_GATT_OK,
                    core::ptr::null_mut(),
                );
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// BLE adapter
// ───────────────────────────────────────────────────────────────

pub struct BleAdapter {
    device_name: heapless::String<29>,
    advertising: bool,
    scanning: bool,
    /// Simulation: notifications accepted, by characteristic.
    #[cfg(not(target_os = "espidf"))]
    sim_notifications: [u32; Characteristic::COUNT],
}

impl BleAdapter {
    pub fn new(device_name: heapless::String<29>) -> Self {
        let _ = cache_store(Characteristic::Capabilities, &[CAPABILITIES]);
        Self {
            device_name,
            advertising: false,
            scanning: false,
            #[cfg(not(target_os = "espidf"))]
            sim_notifications: [0; Characteristic::COUNT],
        }
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Bring up the controller and host and register the Improv service.
    /// Completion arrives later as [`HostEvent::Synced`](crate::events::HostEvent::Synced).
    #[cfg(target_os = "espidf")]
    pub fn init(&mut self) -> Result<(), esp_idf_svc::sys::EspError> {
        use esp_idf_svc::sys::*;
        unsafe {
            // BLE only; frees the classic BT controller memory.
            esp!(esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT))?;

            let mut bt_cfg = esp_bt_controller_config_t::default();
            esp!(esp_bt_controller_init(&mut bt_cfg))?;
            esp!(esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE))?;
            esp!(esp_bluedroid_init())?;
            esp!(esp_bluedroid_enable())?;

            esp!(esp_ble_gap_register_callback(Some(ble_gap_event_handler)))?;
            esp!(esp_ble_gatts_register_callback(Some(ble_gatts_event_handler)))?;

            let mut name = [0u8; 30];
            name[..self.device_name.len()].copy_from_slice(self.device_name.as_bytes());
            esp!(esp_ble_gap_set_device_name(name.as_ptr() as *const _))?;

            let mut adv = advertising_data();
            esp!(esp_ble_gap_config_adv_data_raw(adv.as_mut_ptr(), adv.len() as u32))?;
            let mut rsp = scan_response_data(&self.device_name);
            esp!(esp_ble_gap_config_scan_rsp_data_raw(rsp.as_mut_ptr(), rsp.len() as u32))?;

            esp!(esp_ble_gatts_app_register(0))?;
        }
        info!("BLE(espidf): Bluedroid up, registering Improv service as '{}'", self.device_name);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn init(&mut self) -> Result<(), TransportError> {
        info!(
            "BLE(sim): host up as '{}' (service {:032x})",
            self.device_name, SERVICE_UUID
        );
        HOST_EVENTS.push(HostEvent::Synced);
        Ok(())
    }

    /// Notifications sent on `characteristic` (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_notifications(&self, characteristic: Characteristic) -> u32 {
        self.sim_notifications[characteristic as usize]
    }
}

// ───────────────────────────────────────────────────────────────
// BleHostPort implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl BleHostPort for BleAdapter {
    fn start_advertising(&mut self) -> Result<(), TransportError> {
        BLE_ADV_WANTED.store(true, AtomicOrdering::Release);
        if !BLE_ADV_READY.load(AtomicOrdering::Acquire) {
            // Started from the data-set completion callback.
            self.advertising = true;
            return Ok(());
        }
        let rc = unsafe { start_advertising_raw() };
        if rc != esp_idf_svc::sys::ESP_OK {
            return Err(TransportError::AdvertisingStart(rc));
        }
        self.advertising = true;
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), TransportError> {
        BLE_ADV_WANTED.store(false, AtomicOrdering::Release);
        let rc = unsafe { esp_idf_svc::sys::esp_ble_gap_stop_advertising() };
        self.advertising = false;
        if rc != esp_idf_svc::sys::ESP_OK {
            return Err(TransportError::AdvertisingStop(rc));
        }
        Ok(())
    }

    fn start_scan(&mut self, params: &ScanParams) -> Result<(), TransportError> {
        use esp_idf_svc::sys::*;
        let mut scan_params = esp_ble_scan_params_t {
            scan_type: match params.mode {
                ScannerMode::Active => esp_ble_scan_type_t_BLE_SCAN_TYPE_ACTIVE,
                ScannerMode::Passive => esp_ble_scan_type_t_BLE_SCAN_TYPE_PASSIVE,
            },
            own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
            scan_filter_policy: esp_ble_scan_filter_t_BLE_SCAN_FILTER_ALLOW_ALL,
            scan_interval: params.interval,
            scan_window: params.window,
            scan_duplicate: if params.filter_duplicates {
                esp_ble_scan_duplicate_t_BLE_SCAN_DUPLICATE_ENABLE
            } else {
                esp_ble_scan_duplicate_t_BLE_SCAN_DUPLICATE_DISABLE
            },
        };
        // Scanning starts from the parameter-set completion callback.
        let rc = unsafe { esp_ble_gap_set_scan_params(&mut scan_params) };
        if rc != ESP_OK {
            return Err(TransportError::ScanStart(rc));
        }
        self.scanning = true;
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), TransportError> {
        let rc = unsafe { esp_idf_svc::sys::esp_ble_gap_stop_scanning() };
        self.scanning = false;
        if rc != esp_idf_svc::sys::ESP_OK {
            return Err(TransportError::ScanStop(rc));
        }
        Ok(())
    }

    fn notify(&mut self, conn: ConnHandle, characteristic: Characteristic, data: &[u8]) -> Result<(), TransportError> {
        let handle = handle_for(characteristic);
        if handle == 0 {
            return Err(TransportError::NotReady);
        }
        let rc = unsafe {
            esp_idf_svc::sys::esp_ble_gatts_send_indicate(
                BLE_GATTS_IF.load(AtomicOrdering::Relaxed) as u8,
                conn.0,
                handle,
                data.len() as u16,
                data.as_ptr() as *mut u8,
                false,
            )
        };
        if rc != esp_idf_svc::sys::ESP_OK {
            return Err(TransportError::NotifySend(rc));
        }
        Ok(())
    }

    fn set_value(&mut self, characteristic: Characteristic, data: &[u8]) -> Result<(), TransportError> {
        cache_store(characteristic, data)
    }
}

#[cfg(not(target_os = "espidf"))]
impl BleHostPort for BleAdapter {
    fn start_advertising(&mut self) -> Result<(), TransportError> {
        if !self.advertising {
            info!("BLE(sim): advertising '{}'", self.device_name);
        }
        self.advertising = true;
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), TransportError> {
        info!("BLE(sim): advertising stopped");
        self.advertising = false;
        Ok(())
    }

    fn start_scan(&mut self, params: &ScanParams) -> Result<(), TransportError> {
        info!(
            "BLE(sim): scanning {:?} (interval {}, window {})",
            params.mode, params.interval, params.window
        );
        self.scanning = true;
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), TransportError> {
        info!("BLE(sim): scan stopped");
        self.scanning = false;
        Ok(())
    }

    fn notify(&mut self, conn: ConnHandle, characteristic: Characteristic, data: &[u8]) -> Result<(), TransportError> {
        info!(
            "BLE(sim): notify conn {} on {} ({} bytes)",
            conn.0,
            characteristic.name(),
            data.len()
        );
        self.sim_notifications[characteristic as usize] += 1;
        Ok(())
    }

    fn set_value(&mut self, characteristic: Characteristic, data: &[u8]) -> Result<(), TransportError> {
        cache_store(characteristic, data)
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
