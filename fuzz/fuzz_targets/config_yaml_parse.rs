//! Fuzz target for build-config and class-table YAML parsing.
//!
//! This fuzzer feeds arbitrary text to both configuration parsers and to
//! static validation, checking for panics, crashes, or hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use segtiler::config::{BuildConfig, ClassTable};

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(config) = BuildConfig::from_yaml_str(text) {
        let _ = config.validate();
    }
    let _ = ClassTable::from_yaml_str(text);
});
