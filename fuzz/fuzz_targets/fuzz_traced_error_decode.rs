//! Fuzz target for traced-error decoding.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = apm_errors::decode_traced_error(data);
});
