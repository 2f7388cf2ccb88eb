//! Byte transport under the upstream frame codec.
//!
//! The API server wraps each accepted TCP socket in a [`Transport`]; tests
//! substitute an in-memory pipe.  The client code is generic over it and
//! never sees a socket.

use crate::error::TransportError;

/// Non-blocking, byte-oriented channel to one upstream client.
pub trait Transport {
    /// Read up to `buf.len()` bytes.  `Ok(0)` means no data right now;
    /// a peer that has gone away reports [`TransportError::Closed`].
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write all of `data` or fail.
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;
}
