//! Device identity derived from the factory MAC address.
//!
//! The last three MAC bytes give a stable suffix for the advertised name
//! (`Halo-XXYYZZ`).  Full addresses are printed most-significant byte first.

use core::fmt::Write;

/// Full 6-byte MAC address, as printed (most significant byte first).
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// `AA:BB:CC:DD:EE:FF`
pub fn mac_pretty(mac: &MacAddress) -> heapless::String<17> {
    let mut s = heapless::String::new();
    for (i, b) in mac.iter().enumerate() {
        let sep = if i == 0 { "" } else { ":" };
        let _ = write!(s, "{sep}{b:02X}");
    }
    s
}

/// Format a relay address (48 bits packed little-endian into a `u64`).
pub fn packed_address_pretty(address: u64) -> heapless::String<17> {
    let le = address.to_le_bytes();
    mac_pretty(&[le[5], le[4], le[3], le[2], le[1], le[0]])
}

/// `<prefix>-XXYYZZ`, truncated to the 29-byte advertising name limit.
pub fn device_name(prefix: &str, mac: &MacAddress) -> heapless::String<29> {
    let mut name = heapless::String::new();
    for c in prefix.chars().take(21) {
        let _ = name.push(c);
    }
    let _ = write!(name, "-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    name
}
