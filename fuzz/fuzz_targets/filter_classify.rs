// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Fuzz target for the filter algebra.
//!
//! Filters arrive as client JSON. Any tree that parses must normalize to a
//! fixpoint, classify the same before and after normalization, and be
//! refused by `flatten` whenever `classify` rejects it.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mailsift::filter::{classify, describe, flatten, normalize, FilterNode};

fuzz_target!(|data: &[u8]| {
    let Ok(tree) = serde_json::from_slice::<FilterNode>(data) else {
        return;
    };

    let normal = normalize(&tree);
    assert_eq!(normalize(&normal), normal, "normalize is not idempotent");

    let verdict = classify(&tree);
    assert_eq!(verdict, classify(&normal));
    assert_eq!(describe(&tree), describe(&normal));

    if !verdict.is_accepted() {
        assert!(flatten(&tree).is_err());
    }
});
