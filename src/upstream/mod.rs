//! Upstream API channel: framing, transport and client requests.
//!
//! ```text
//!  Transport ──bytes──▶ FrameDecoder ──payload──▶ DownstreamRequest
//!  UpstreamMessage ──postcard──▶ encode_frame ──bytes──▶ Transport
//! ```

pub mod codec;
pub mod messages;
pub mod transport;
