//! Serializable messages the relay hands to the upstream API channel.
//!
//! These types are the whole contract between the relay and any upstream
//! transport.  The TCP API server frames them with postcard; tests inspect
//! them directly.

use serde::{Deserialize, Serialize};

/// Legacy advertising data plus scan response.
pub const MAX_ADV_DATA: usize = 62;

pub type AdvPayload = heapless::Vec<u8, MAX_ADV_DATA>;

/// BLE address type tag as reported by the host stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AddressType {
    Public = 0,
    Random = 1,
    PublicIdentity = 2,
    RandomIdentity = 3,
}

impl AddressType {
    /// Unknown codes are reported as random addresses.
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Public,
            2 => Self::PublicIdentity,
            3 => Self::RandomIdentity,
            _ => Self::Random,
        }
    }
}

/// One forwarded sighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAdvertisement {
    /// 48-bit address packed little-endian into the low bytes.
    pub address: u64,
    pub rssi: i8,
    pub address_type: AddressType,
    /// Length is carried explicitly by the serialized sequence.
    pub data: AdvPayload,
}

/// Up to one buffer's worth of sightings, in arrival order.
pub type AdvertisementBatch = heapless::Vec<RawAdvertisement, { crate::relay::buffer::MAX_BATCH_CAPACITY }>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ScannerState {
    Idle = 0,
    Starting = 1,
    Running = 2,
    Failed = 3,
    Stopping = 4,
    Stopped = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ScannerMode {
    Passive = 0,
    Active = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerStateReport {
    pub state: ScannerState,
    pub mode: ScannerMode,
    pub configured_mode: ScannerMode,
}

/// Everything the relay sends upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpstreamMessage {
    Advertisements(AdvertisementBatch),
    ScannerState(ScannerStateReport),
}

/// Pack a 6-byte little-endian address (least significant byte first).
pub fn pack_address(addr: &[u8; 6]) -> u64 {
    addr.iter()
        .enumerate()
        .fold(0u64, |acc, (i, b)| acc | (u64::from(*b) << (i * 8)))
}
