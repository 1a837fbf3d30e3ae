//! Fuzz test for MAC configuration parsing
//!
//! Tests that arbitrary TOML input doesn't cause panics when parsed as a
//! `MacConfig`, and that accepted configs either validate or are rejected
//! by `MacSession::init`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ssh_mac::{MacConfig, MacSession};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = toml::from_str::<MacConfig>(s) {
            let valid = config.validate().is_ok();
            assert_eq!(MacSession::init(config).is_ok(), valid);
        }
    }
});
