//! Improv RPC frame codec.
//!
//! Command frames (client → device, written to the rpc-command characteristic):
//! ```text
//! ┌──────┬──────────┬────────────┬──────────┬────────────┐
//! │ id   │ ssid_len │ ssid bytes │ pass_len │ pass bytes │   WIFI_SETTINGS
//! │ 1 B  │ 1 B      │ N B        │ 1 B      │ M B        │
//! └──────┴──────────┴────────────┴──────────┴────────────┘
//! ```
//! Other commands carry no payload but are still padded to the 3-byte
//! minimum by clients.  Trailing bytes after the last field are ignored.
//!
//! Response frames (device → client, notified on rpc-result) are the
//! command id followed by length-prefixed string fields.
//!
//! Pure functions, no I/O.

use core::fmt::{self, Write};
use core::net::Ipv4Addr;

use super::CommandId;
use crate::config::DeviceInfo;
use crate::error::ProtocolError;

/// Frames shorter than this are rejected outright.
pub const MIN_FRAME_LEN: usize = 3;
pub const MAX_SSID_LEN: usize = 32;
pub const MAX_PASSWORD_LEN: usize = 64;
/// Large enough for a device-info response with four 32-byte fields.
pub const MAX_RESPONSE_LEN: usize = 160;
/// Command frame upper bound: id + two length bytes + SSID + password.
pub const MAX_COMMAND_LEN: usize = 3 + MAX_SSID_LEN + MAX_PASSWORD_LEN;

pub type Ssid = heapless::String<MAX_SSID_LEN>;
pub type Password = heapless::String<MAX_PASSWORD_LEN>;
pub type ResponseFrame = heapless::Vec<u8, MAX_RESPONSE_LEN>;
pub type CommandFrame = heapless::Vec<u8, MAX_COMMAND_LEN>;

// ───────────────────────────────────────────────────────────────
// Types
// ───────────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: Ssid,
    pub password: Password,
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A decoded RPC command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    WifiSettings(WifiCredentials),
    Identify,
    GetDeviceInfo,
    GetWifiNetworks,
}

impl Command {
    pub fn id(&self) -> CommandId {
        match self {
            Self::WifiSettings(_) => CommandId::WifiSettings,
            Self::Identify => CommandId::Identify,
            Self::GetDeviceInfo => CommandId::GetDeviceInfo,
            Self::GetWifiNetworks => CommandId::GetWifiNetworks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Too short, a length runs past the end, or a string is not valid.
    InvalidFrame,
    /// First byte is not a known command id.
    UnknownCommand(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFrame => write!(f, "invalid frame"),
            Self::UnknownCommand(id) => write!(f, "unknown command 0x{id:02X}"),
        }
    }
}

impl From<DecodeError> for ProtocolError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::InvalidFrame => Self::InvalidFrame,
            DecodeError::UnknownCommand(_) => Self::UnknownCommand,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// A single field exceeds the 255-byte length prefix.
    FieldTooLong,
    /// The whole frame does not fit the response buffer.
    FrameTooLong,
    /// No wire format is defined for this response (GET_WIFI_NETWORKS).
    Unsupported,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldTooLong => write!(f, "field longer than 255 bytes"),
            Self::FrameTooLong => write!(f, "frame exceeds {MAX_RESPONSE_LEN} bytes"),
            Self::Unsupported => write!(f, "response format not defined"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Decoding
// ───────────────────────────────────────────────────────────────

/// Parse a frame written to the rpc-command characteristic.
pub fn decode_command(bytes: &[u8]) -> Result<Command, DecodeError> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(DecodeError::InvalidFrame);
    }

    let id = CommandId::from_byte(bytes[0]).ok_or(DecodeError::UnknownCommand(bytes[0]))?;

    match id {
        CommandId::WifiSettings => {
            let mut cursor = 1;
            let ssid = take_field(bytes, &mut cursor)?;
            let password = take_field(bytes, &mut cursor)?;
            Ok(Command::WifiSettings(WifiCredentials {
                ssid: to_string(ssid)?,
                password: to_string(password)?,
            }))
        }
        CommandId::Identify => Ok(Command::Identify),
        CommandId::GetDeviceInfo => Ok(Command::GetDeviceInfo),
        CommandId::GetWifiNetworks => Ok(Command::GetWifiNetworks),
    }
}

/// Read one `[len][bytes]` field starting at `*cursor`.
fn take_field<'a>(bytes: &'a [u8], cursor: &mut usize) -> Result<&'a [u8], DecodeError> {
    let len = *bytes.get(*cursor).ok_or(DecodeError::InvalidFrame)? as usize;
    let start = *cursor + 1;
    let end = start + len;
    let field = bytes.get(start..end).ok_or(DecodeError::InvalidFrame)?;
    *cursor = end;
    Ok(field)
}

fn to_string<const N: usize>(raw: &[u8]) -> Result<heapless::String<N>, DecodeError> {
    let s = core::str::from_utf8(raw).map_err(|_| DecodeError::InvalidFrame)?;
    heapless::String::try_from(s).map_err(|()| DecodeError::InvalidFrame)
}

// ───────────────────────────────────────────────────────────────
// Encoding
// ───────────────────────────────────────────────────────────────

/// Build a response frame: `[command][len][field]...`.
pub fn encode_response(command: CommandId, fields: &[&[u8]]) -> Result<ResponseFrame, EncodeError> {
    if command == CommandId::GetWifiNetworks {
        return Err(EncodeError::Unsupported);
    }

    let mut out = ResponseFrame::new();
    out.push(command as u8).map_err(|_| EncodeError::FrameTooLong)?;
    for field in fields {
        let len = u8::try_from(field.len()).map_err(|_| EncodeError::FieldTooLong)?;
        out.push(len).map_err(|_| EncodeError::FrameTooLong)?;
        out.extend_from_slice(field).map_err(|()| EncodeError::FrameTooLong)?;
    }
    Ok(out)
}

/// GET_DEVICE_INFO response: firmware, version, hardware, device name.
pub fn encode_device_info(info: &DeviceInfo) -> Result<ResponseFrame, EncodeError> {
    encode_response(
        CommandId::GetDeviceInfo,
        &[
            info.firmware_name.as_bytes(),
            info.version.as_bytes(),
            info.hardware.as_bytes(),
            info.device_name.as_bytes(),
        ],
    )
}

/// `http://a.b.c.d/`
pub fn redirect_url(ip: Ipv4Addr) -> heapless::String<24> {
    let mut url = heapless::String::new();
    // Longest form is "http://255.255.255.255/" (23 bytes).
    let _ = write!(url, "http://{ip}/");
    url
}

/// WIFI_SETTINGS success response carrying the redirect URL.
pub fn encode_wifi_connected(ip: Ipv4Addr) -> Result<ResponseFrame, EncodeError> {
    let url = redirect_url(ip);
    encode_response(CommandId::WifiSettings, &[url.as_bytes()])
}

/// Client-side WIFI_SETTINGS command frame.
pub fn encode_wifi_settings(ssid: &str, password: &str) -> Result<CommandFrame, EncodeError> {
    if ssid.len() > MAX_SSID_LEN || password.len() > MAX_PASSWORD_LEN {
        return Err(EncodeError::FieldTooLong);
    }
    let mut out = CommandFrame::new();
    // Capacity covers the largest accepted credentials.
    let _ = out.push(CommandId::WifiSettings as u8);
    let _ = out.push(ssid.len() as u8);
    let _ = out.extend_from_slice(ssid.as_bytes());
    let _ = out.push(password.len() as u8);
    let _ = out.extend_from_slice(password.as_bytes());
    Ok(out)
}
