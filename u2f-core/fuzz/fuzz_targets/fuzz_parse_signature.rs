#![no_main]

//! Fuzz target for signature message parsing
//!
//! Run with: cargo +nightly fuzz run fuzz_parse_signature

use libfuzzer_sys::fuzz_target;
use u2f_core::parser::{parse_signature, websafe_encode};
use u2f_core::SignResponse;

fuzz_target!(|data: &[u8]| {
    let response = SignResponse {
        key_handle: String::new(),
        signature_data: websafe_encode(data),
        client_data: websafe_encode(data),
    };
    let _ = parse_signature(&response);
});
