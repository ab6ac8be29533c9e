//! Fuzz target for the TOML options loader.
//!
//! The CLI deserializes caller-supplied files into `RenderOptions`; parsing
//! must reject malformed input with an error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use platen::RenderOptions;

fuzz_target!(|data: &str| {
    let _ = toml::from_str::<RenderOptions>(data);
});
