// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Token derivation for posting keys.
//!
//! Address tokens let a user find "Alice Smith <alice@example.com>" by typing
//! `alice`, `smith`, `example.com` or the full address. Subject and body tokens
//! are plain lower-cased words. Queries must go through [`normalize_token`] too,
//! otherwise prefix scans silently miss.

#[cfg(feature = "unicode-normalization")]
use unicode_normalization::UnicodeNormalization;

use std::collections::HashSet;

use super::{PostingKey, TokenField};
use crate::email::{EmailAddress, EmailRecord};
use crate::error::Result;

/// NFC-compose then lower-case.
#[cfg(feature = "unicode-normalization")]
pub fn normalize_token(value: &str) -> String {
    value.nfc().collect::<String>().to_lowercase()
}

/// Lower-case only; assumes input is already composed.
#[cfg(not(feature = "unicode-normalization"))]
pub fn normalize_token(value: &str) -> String {
    value.to_lowercase()
}

/// Order-preserving set of tokens.
#[derive(Default)]
struct TokenSet {
    seen: HashSet<String>,
    tokens: Vec<String>,
}

impl TokenSet {
    fn add(&mut self, raw: &str) {
        let token = normalize_token(raw);
        if token.is_empty() || self.seen.contains(&token) {
            return;
        }
        self.seen.insert(token.clone());
        self.tokens.push(token);
    }
}

/// Tokens for one address: display-name words, full address, local part, domain.
pub fn tokenize_address(addr: &EmailAddress) -> Vec<String> {
    let mut set = TokenSet::default();
    add_address(&mut set, addr);
    set.tokens
}

/// Deduplicated tokens over several addresses, first-seen order.
pub fn tokenize_addresses(addrs: &[EmailAddress]) -> Vec<String> {
    let mut set = TokenSet::default();
    for addr in addrs {
        add_address(&mut set, addr);
    }
    set.tokens
}

fn add_address(set: &mut TokenSet, addr: &EmailAddress) {
    if let Some(name) = addr.name.as_deref() {
        for word in name.split_whitespace() {
            set.add(word);
        }
    }
    if !addr.email.is_empty() {
        set.add(&addr.email);
        if let Some(at) = addr.email.rfind('@') {
            if at > 0 {
                set.add(&addr.email[..at]);
                set.add(&addr.email[at + 1..]);
            }
        }
    }
}

/// Deduplicated words of free text, split on anything that isn't alphanumeric.
pub fn tokenize_text(text: &str) -> Vec<String> {
    let mut set = TokenSet::default();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        set.add(word);
    }
    set.tokens
}

/// Every posting key an email produces.
///
/// Codec errors propagate: a token that would corrupt the key space fails the
/// whole document rather than being dropped.
pub fn posting_keys(record: &EmailRecord) -> Result<Vec<PostingKey>> {
    let fields: [(TokenField, Vec<String>); 6] = [
        (TokenField::From, tokenize_addresses(&record.from)),
        (TokenField::To, tokenize_addresses(&record.to)),
        (TokenField::Cc, tokenize_addresses(&record.cc)),
        (TokenField::Bcc, tokenize_addresses(&record.bcc)),
        (TokenField::Subject, tokenize_text(&record.subject)),
        (TokenField::Body, tokenize_text(&record.body)),
    ];

    let mut keys = Vec::new();
    for (field, tokens) in fields {
        for token in tokens {
            keys.push(PostingKey::new(
                field,
                &token,
                &record.received_at,
                &record.email_id,
            )?);
        }
    }
    Ok(keys)
}
