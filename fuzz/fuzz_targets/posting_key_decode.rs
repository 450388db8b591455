// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Fuzz target for posting-key decoding.
//!
//! Sort keys come back from the store as plain strings. Whatever is in there,
//! decoding must return a key or an error, and a decoded key must re-encode to
//! the exact input.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mailsift::keys::decode;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    // Never panics.
    let Ok(key) = decode(input) else {
        return;
    };

    assert_eq!(key.encode(), input, "decode/encode is not an inverse");
    assert!(!key.document_id().is_empty());
    assert!(!key.document_id().contains('#'));
});
