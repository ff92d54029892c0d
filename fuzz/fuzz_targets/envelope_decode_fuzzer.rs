//! Fuzz target for envelope decoding
//!
//! Provider frames are untrusted input; decoding must reject garbage
//! without panicking.
//!
//! # Invariants
//!
//! - NEVER panic on arbitrary bytes
//! - Frames over `MAX_FRAME_SIZE` are rejected
//! - A decoded envelope re-encodes and decodes to the same value

#![no_main]

use chorus_proto::{decode, encode, ProtoError, MAX_FRAME_SIZE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let envelope = match decode(data) {
        Ok(envelope) => envelope,
        Err(ProtoError::FrameTooLarge { size, max }) => {
            assert!(size > max);
            return;
        },
        Err(_) => return,
    };

    assert!(data.len() <= MAX_FRAME_SIZE);

    // Decoding may add the structured lifecycle, which can push a frame
    // near the limit over it.
    let frame = match encode(&envelope) {
        Ok(frame) => frame,
        Err(ProtoError::FrameTooLarge { .. }) => return,
        Err(e) => panic!("decoded envelope failed to encode: {e}"),
    };
    let again = decode(&frame).expect("re-encoded envelope must decode");
    assert_eq!(again, envelope);
});
