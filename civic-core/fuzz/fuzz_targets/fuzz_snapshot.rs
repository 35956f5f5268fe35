#![no_main]

//! Fuzz target for RecordSnapshot::from_json()
//!
//! Malformed snapshots and fingerprint hex must surface as errors, never
//! panics. Parsed snapshots are then run through a duplicate check.
//!
//! Run with: cargo +nightly fuzz run fuzz_snapshot

use civic_core::{Coordinate, DuplicateDetector, Fingerprint, MemoryRecordStore, RecordSnapshot};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let _ = Fingerprint::from_hex(text);

    if let Ok(snapshot) = RecordSnapshot::from_json(text) {
        let store = MemoryRecordStore::from_snapshot(snapshot);
        let query = Fingerprint::from_bytes(vec![0u8; 8]).ok();
        let here = Coordinate::new(12.9716, 77.5946).ok();
        if let Some(query) = query {
            let _ = DuplicateDetector::new(&store).check_fingerprint(&query, here);
            let _ = DuplicateDetector::new(&store).check_fingerprint(&query, None);
        }
    }
});
