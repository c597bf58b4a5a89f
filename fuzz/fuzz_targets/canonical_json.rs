//! Fuzz harness for the canonical JSON encoder.
//!
//! Feeds arbitrary bytes through JSON parsing and canonicalization,
//! checking that the encoder never panics and that accepted values
//! canonicalize idempotently: re-parsing canonical output and encoding it
//! again must reproduce the same bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use missive_core::canonical::to_canonical_json;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return;
    };
    let Ok(canonical) = to_canonical_json(&value) else {
        return;
    };

    let reparsed: serde_json::Value =
        serde_json::from_str(&canonical).expect("canonical output must be valid JSON");
    let again = to_canonical_json(&reparsed).expect("canonical output must re-canonicalize");
    assert_eq!(again, canonical, "canonicalization must be idempotent");
});
