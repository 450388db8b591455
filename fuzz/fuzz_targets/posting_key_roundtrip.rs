// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Fuzz target for posting-key encoding.
//!
//! Arbitrary tokens, timestamps and document ids either encode to a key that
//! decodes back to the same parts, or are refused up front.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mailsift::keys::{decode, encode, TokenField};

#[derive(Debug, Arbitrary)]
struct Input {
    field: u8,
    token: String,
    received_at: String,
    document_id: String,
}

fuzz_target!(|input: Input| {
    let field = TokenField::ALL[input.field as usize % TokenField::ALL.len()];
    let Ok(key) = encode(field, &input.token, &input.received_at, &input.document_id) else {
        return;
    };

    let decoded = decode(&key).expect("encoded key must decode");
    assert_eq!(decoded.field(), field);
    assert_eq!(decoded.token(), input.token.to_lowercase());
    assert_eq!(decoded.received_at(), input.received_at);
    assert_eq!(decoded.document_id(), input.document_id);
    assert_eq!(decoded.encode(), key);
});
