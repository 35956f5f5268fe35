#![no_main]

//! Fuzz target for fingerprint computation
//!
//! Upload bytes are untrusted; decoding failures must come back as
//! `InvalidImage`.
//!
//! Run with: cargo +nightly fuzz run fuzz_fingerprint

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(fingerprint) = civic_core::compute(data) {
        assert_eq!(fingerprint.bit_len(), 64);
    }
});
