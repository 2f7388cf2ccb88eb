//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements       | Connects to                   |
//! |--------------|------------------|-------------------------------|
//! | `ble`        | BleHostPort      | Bluedroid GAP + GATT server   |
//! | `wifi`       | ConnectivityPort | ESP-IDF WiFi STA              |
//! | `indicator`  | IndicatorPort    | Status LED GPIO               |
//! | `api_server` | UpstreamPort     | TCP clients (postcard frames) |
//! | `nvs`        | ConfigPort       | NVS / in-memory store         |
//! | `button`     | —                | Authorization button GPIO     |
//! | `time`       | —                | ESP32 system timer            |
//! | `device_id`  | —                | Factory MAC                   |

pub mod api_server;
pub mod ble;
pub mod button;
pub mod device_id;
pub mod indicator;
pub mod nvs;
pub mod time;
pub(super) mod utils;
pub mod wifi;
