//! Length-prefix frame codec for the upstream API channel.
//!
//! Wire format:
//! ```text
//! ┌────────────┬─────────────────────────┐
//! │ Length (2B)│ postcard payload (N B)  │
//! │ LE u16     │                         │
//! └────────────┴─────────────────────────┘
//! ```
//!
//! The decoder accumulates incoming bytes and yields complete frames.  A
//! single read may carry part of a header, part of a payload, or several
//! frames back to back; every complete frame is handed out.

/// Largest accepted payload.  A full advertisement batch is well below it.
pub const MAX_FRAME_SIZE: usize = 2048;

/// Frame header size (2-byte little-endian length).
pub const HEADER_SIZE: usize = 2;

enum DecoderState {
    ReadingHeader { collected: usize },
    ReadingPayload { expected: usize, collected: usize },
}

/// Streaming frame decoder.
pub struct FrameDecoder {
    state: DecoderState,
    header_buf: [u8; HEADER_SIZE],
    payload_buf: [u8; MAX_FRAME_SIZE],
    /// Headers rejected as zero-length or oversized.
    rejected: u32,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::ReadingHeader { collected: 0 },
            header_buf: [0; HEADER_SIZE],
            payload_buf: [0; MAX_FRAME_SIZE],
            rejected: 0,
        }
    }

    /// Feed bytes into the decoder, calling `on_frame` for each complete
    /// payload.  Returns the number of frames produced.
    pub fn feed(&mut self, data: &[u8], mut on_frame: impl FnMut(&[u8])) -> usize {
        let mut offset = 0;
        let mut frames = 0;

        while offset < data.len() {
            match &mut self.state {
                DecoderState::ReadingHeader { collected } => {
                    let to_copy = (HEADER_SIZE - *collected).min(data.len() - offset);
                    self.header_buf[*collected..*collected + to_copy]
                        .copy_from_slice(&data[offset..offset + to_copy]);
                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == HEADER_SIZE {
                        let expected = u16::from_le_bytes(self.header_buf) as usize;
                        if expected == 0 || expected > MAX_FRAME_SIZE {
                            // Resynchronise on the next header.
                            self.rejected = self.rejected.wrapping_add(1);
                            self.state = DecoderState::ReadingHeader { collected: 0 };
                            continue;
                        }
                        self.state = DecoderState::ReadingPayload { expected, collected: 0 };
                    }
                }

                DecoderState::ReadingPayload { expected, collected } => {
                    let to_copy = (*expected - *collected).min(data.len() - offset);
                    self.payload_buf[*collected..*collected + to_copy]
                        .copy_from_slice(&data[offset..offset + to_copy]);
                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == *expected {
                        let len = *expected;
                        self.state = DecoderState::ReadingHeader { collected: 0 };
                        on_frame(&self.payload_buf[..len]);
                        frames += 1;
                    }
                }
            }
        }

        frames
    }

    /// Reset decoder state (e.g. after a client reconnects).
    pub fn reset(&mut self) {
        self.state = DecoderState::ReadingHeader { collected: 0 };
    }

    pub fn rejected(&self) -> u32 {
        self.rejected
    }
}

/// Write `[LE-u16 length][payload]` into `out_buf`.
///
/// Returns the total number of bytes written, or `None` if the payload is
/// empty, too large, or does not fit.
pub fn encode_frame(payload: &[u8], out_buf: &mut [u8]) -> Option<usize> {
    let total = HEADER_SIZE + payload.len();
    if payload.is_empty() || payload.len() > MAX_FRAME_SIZE || total > out_buf.len() {
        return None;
    }
    let len = u16::try_from(payload.len()).ok()?;
    out_buf[..HEADER_SIZE].copy_from_slice(&len.to_le_bytes());
    out_buf[HEADER_SIZE..total].copy_from_slice(payload);
    Some(total)
}
