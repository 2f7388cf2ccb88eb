//! Unified error types for the Halo firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! main loop's error handling uniform.  All variants are `Copy` so they can
//! be passed through the state machine and the relay without allocation.
//!
//! None of these are fatal: protocol errors surface on the Improv error
//! characteristic, transport errors are logged and retried on the next
//! natural trigger, resource errors disable the affected feature.

use core::fmt;

use crate::improv::ImprovError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An Improv client sent something the protocol rejects.
    Protocol(ProtocolError),
    /// A BLE host or upstream channel call failed.
    Transport(TransportError),
    /// A fixed-capacity resource could not be set up.
    Resource(ResourceError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Resource(e) => write!(f, "resource: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

/// Errors reported to the BLE client through the error characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame too short or a declared length runs past the buffer.
    InvalidFrame,
    /// Command id outside the known set.
    UnknownCommand,
    /// WIFI_SETTINGS arrived outside the Authorized state.
    NotAuthorized,
    /// The WiFi attempt failed or timed out.
    UnableToConnect,
    Unknown,
}

impl ProtocolError {
    /// Wire code written to the error characteristic.
    pub const fn code(self) -> ImprovError {
        match self {
            Self::InvalidFrame => ImprovError::InvalidRpc,
            Self::UnknownCommand => ImprovError::UnknownRpc,
            Self::NotAuthorized => ImprovError::NotAuthorized,
            Self::UnableToConnect => ImprovError::UnableToConnect,
            Self::Unknown => ImprovError::Unknown,
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFrame => write!(f, "invalid RPC frame"),
            Self::UnknownCommand => write!(f, "unknown RPC command"),
            Self::NotAuthorized => write!(f, "not authorized"),
            Self::UnableToConnect => write!(f, "unable to connect to WiFi"),
            Self::Unknown => write!(f, "unknown error"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Adapter call failures.  The `i32` is the platform status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Advertising or scan-response payload rejected by the host.
    SetFields(i32),
    AdvertisingStart(i32),
    AdvertisingStop(i32),
    ScanStart(i32),
    ScanStop(i32),
    /// Characteristic notification could not be queued.
    NotifySend(i32),
    /// Characteristic value cache update rejected.
    SetValue(i32),
    /// The BLE host has not finished initialising.
    NotReady,
    /// No live connection for the requested handle.
    NotConnected,
    /// Upstream subscriber write failed.
    Send,
    /// Upstream peer closed its end.
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetFields(rc) => write!(f, "set advertising fields failed ({rc})"),
            Self::AdvertisingStart(rc) => write!(f, "advertising start failed ({rc})"),
            Self::AdvertisingStop(rc) => write!(f, "advertising stop failed ({rc})"),
            Self::ScanStart(rc) => write!(f, "scan start failed ({rc})"),
            Self::ScanStop(rc) => write!(f, "scan stop failed ({rc})"),
            Self::NotifySend(rc) => write!(f, "notification send failed ({rc})"),
            Self::SetValue(rc) => write!(f, "characteristic value update failed ({rc})"),
            Self::NotReady => write!(f, "BLE host not ready"),
            Self::NotConnected => write!(f, "no active connection"),
            Self::Send => write!(f, "upstream send failed"),
            Self::Closed => write!(f, "upstream peer closed"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Resource errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// Requested advertisement buffer capacity is outside `1..=max`.
    BufferAllocation { requested: usize, max: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferAllocation { requested, max } => write!(
                f,
                "advertisement buffer of {requested} entries not available (1..={max})"
            ),
        }
    }
}

impl From<ResourceError> for Error {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
