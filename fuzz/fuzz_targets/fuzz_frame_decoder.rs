//! Fuzz target: `FrameDecoder::feed`
//!
//! Drives arbitrary byte sequences into the streaming frame decoder and
//! asserts that it never panics, never yields empty or oversized payloads,
//! and produces the same frames whether the input arrives whole or split.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use halo::upstream::codec::{FrameDecoder, MAX_FRAME_SIZE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut whole = Vec::new();
    let mut decoder = FrameDecoder::new();
    decoder.feed(data, |payload| {
        assert!(!payload.is_empty(), "decoder must not yield empty payload");
        assert!(payload.len() <= MAX_FRAME_SIZE, "payload exceeds MAX_FRAME_SIZE");
        whole.push(payload.to_vec());
    });

    // Same bytes, split at the first byte's value.
    let split = data.first().map_or(0, |b| usize::from(*b)).min(data.len());
    let mut pieces = Vec::new();
    let mut decoder = FrameDecoder::new();
    decoder.feed(&data[..split], |p| pieces.push(p.to_vec()));
    decoder.feed(&data[split..], |p| pieces.push(p.to_vec()));
    assert_eq!(whole, pieces);
});
