//! Requests sent by upstream clients, and postcard helpers for both
//! directions of the channel.

use serde::{Deserialize, Serialize};

use crate::relay::messages::UpstreamMessage;

/// Client → device request, one per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownstreamRequest {
    /// Start receiving advertisement batches and scanner state.
    Subscribe,
    Unsubscribe,
    /// Turn scanning on or off.
    SetScannerMode { active: bool },
}

pub fn decode_request(payload: &[u8]) -> Result<DownstreamRequest, postcard::Error> {
    postcard::from_bytes(payload)
}

pub fn encode_request(request: &DownstreamRequest) -> Result<Vec<u8>, postcard::Error> {
    postcard::to_allocvec(request)
}

pub fn encode_message(message: &UpstreamMessage) -> Result<Vec<u8>, postcard::Error> {
    postcard::to_allocvec(message)
}

pub fn decode_message(payload: &[u8]) -> Result<UpstreamMessage, postcard::Error> {
    postcard::from_bytes(payload)
}
