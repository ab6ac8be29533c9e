//! Fuzz target for the composed argument line tokenizer.
//!
//! Tests that `split_args` handles arbitrary input without panicking; the
//! batch protocol feeds it whatever line the composer produced, but a
//! malformed line must still tokenize into something.

#![no_main]

use libfuzzer_sys::fuzz_target;
use platen::args::split_args;

fuzz_target!(|data: &str| {
    let tokens = split_args(data);
    // No token may be longer than the input it came from
    for token in &tokens {
        assert!(token.len() <= data.len());
    }
});
