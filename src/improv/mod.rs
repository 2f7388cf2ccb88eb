//! Improv WiFi provisioning protocol: identifiers and wire codes.
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID                                   | Perms        |
//! |----------------|----------------------------------------|--------------|
//! | Status         | `00467768-6228-2272-4663-277478268001` | Read+Notify  |
//! | Error          | `00467768-6228-2272-4663-277478268002` | Read         |
//! | RPC command    | `00467768-6228-2272-4663-277478268003` | Write        |
//! | RPC result     | `00467768-6228-2272-4663-277478268004` | Read+Notify  |
//! | Capabilities   | `00467768-6228-2272-4663-277478268005` | Read         |
//!
//! The error characteristic is never notified.  Clients poll it after an
//! interaction that may have failed.

pub mod codec;

// ───────────────────────────────────────────────────────────────
// UUIDs
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x00467768_6228_2272_4663_277478268000;
pub const CHAR_STATUS: u128 = 0x00467768_6228_2272_4663_277478268001;
pub const CHAR_ERROR: u128 = 0x00467768_6228_2272_4663_277478268002;
pub const CHAR_RPC_COMMAND: u128 = 0x00467768_6228_2272_4663_277478268003;
pub const CHAR_RPC_RESULT: u128 = 0x00467768_6228_2272_4663_277478268004;
pub const CHAR_CAPABILITIES: u128 = 0x00467768_6228_2272_4663_277478268005;

/// Capabilities byte: WiFi provisioning only, no optional flags.
pub const CAPABILITIES: u8 = 0x00;

// ───────────────────────────────────────────────────────────────
// Characteristics
// ───────────────────────────────────────────────────────────────

/// The five characteristics of the Improv service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Characteristic {
    Status = 0,
    Error = 1,
    RpcCommand = 2,
    RpcResult = 3,
    Capabilities = 4,
}

impl Characteristic {
    pub const COUNT: usize = 5;

    /// Registration order used by the GATT adapter.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Status,
        Self::Error,
        Self::RpcCommand,
        Self::RpcResult,
        Self::Capabilities,
    ];

    pub const fn uuid(self) -> u128 {
        match self {
            Self::Status => CHAR_STATUS,
            Self::Error => CHAR_ERROR,
            Self::RpcCommand => CHAR_RPC_COMMAND,
            Self::RpcResult => CHAR_RPC_RESULT,
            Self::Capabilities => CHAR_CAPABILITIES,
        }
    }

    pub fn from_uuid(uuid: u128) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.uuid() == uuid)
    }

    pub const fn is_readable(self) -> bool {
        !matches!(self, Self::RpcCommand)
    }

    pub const fn is_writable(self) -> bool {
        matches!(self, Self::RpcCommand)
    }

    pub const fn is_notifiable(self) -> bool {
        matches!(self, Self::Status | Self::RpcResult)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Error => "error",
            Self::RpcCommand => "rpc-command",
            Self::RpcResult => "rpc-result",
            Self::Capabilities => "capabilities",
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Error codes
// ───────────────────────────────────────────────────────────────

/// Value of the error characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ImprovError {
    #[default]
    None = 0x00,
    InvalidRpc = 0x01,
    UnknownRpc = 0x02,
    UnableToConnect = 0x03,
    NotAuthorized = 0x04,
    Unknown = 0xFF,
}

impl ImprovError {
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

// ───────────────────────────────────────────────────────────────
// Command ids
// ───────────────────────────────────────────────────────────────

/// First byte of every RPC command and response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandId {
    WifiSettings = 0x01,
    Identify = 0x02,
    GetDeviceInfo = 0x03,
    GetWifiNetworks = 0x04,
}

impl CommandId {
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::WifiSettings),
            0x02 => Some(Self::Identify),
            0x03 => Some(Self::GetDeviceInfo),
            0x04 => Some(Self::GetWifiNetworks),
            _ => None,
        }
    }
}
