//! Credential checks shared by the WiFi adapters.

/// Longest SSID the 802.11 standard allows.
pub(super) const MAX_SSID_LEN: usize = 32;
/// WPA2 passphrase bounds; an empty password means an open network.
pub(super) const MIN_WPA2_PASSWORD_LEN: usize = 8;
pub(super) const MAX_PASSWORD_LEN: usize = 64;

/// Returns `true` if every byte of `s` is in the printable ASCII range
/// `0x20..=0x7E`.
pub(super) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub(super) fn is_valid_ssid(ssid: &str) -> bool {
    !ssid.is_empty() && ssid.len() <= MAX_SSID_LEN && is_printable_ascii(ssid)
}

pub(super) fn is_valid_password(password: &str) -> bool {
    password.is_empty() || (MIN_WPA2_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password.len())
}
