#![no_main]

//! Fuzz target for registration message parsing
//!
//! Feeds arbitrary bytes as the decoded registration message, and the raw
//! input as un-encoded text, to exercise the bounds checks and DER length
//! handling.
//!
//! Run with: cargo +nightly fuzz run fuzz_parse_registration

use libfuzzer_sys::fuzz_target;
use u2f_core::parser::{parse_registration, websafe_encode};
use u2f_core::RegisterResponse;

fuzz_target!(|data: &[u8]| {
    let encoded = RegisterResponse {
        registration_data: websafe_encode(data),
        client_data: websafe_encode(br#"{"typ":"t","challenge":"c","origin":"o"}"#),
        version: None,
    };
    // This should never panic - malformed input is a ParseError
    let _ = parse_registration(&encoded);

    let text = String::from_utf8_lossy(data).into_owned();
    let raw = RegisterResponse {
        registration_data: text.clone(),
        client_data: text,
        version: None,
    };
    let _ = parse_registration(&raw);
});
