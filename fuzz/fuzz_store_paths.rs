//! Fuzz target for dot-path writes and reads against the variable store.
//!
//! Run with: cargo +nightly fuzz run fuzz_store_paths
//!
//! Input is split on newlines; each line is written with its index as the
//! value, then read back.

#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::json;
use vartunnel_core::Store;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let mut store = Store::new(false);
    for (i, path) in s.lines().enumerate() {
        let Ok(_) = store.set(path, json!(i)) else {
            unreachable!("mutable store rejected a write");
        };
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            assert_eq!(store.get(trimmed), Some(json!(i)));
        }
    }

    let mut frozen = Store::new(true);
    for path in s.lines() {
        if frozen.set(path, json!("first")).is_ok() && !path.trim().is_empty() {
            assert!(frozen.set(path, json!("second")).is_err());
        }
    }
    let _ = frozen.snapshot();
});
