// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Composite posting keys for the keyword inverted index.
//!
//! Every (field, token) occurrence of an email becomes one item in the account's
//! partition, keyed by a single sortable string:
//!
//! ```text
//! TOK#FROM#alice@example.com#RCVD#2024-01-01T00:00:00Z#em-1
//! └┬─┘└┬─┘└──────┬────────┘└─┬──┘└─────────┬────────┘└┬─┘
//! prefix field   token      marker      receivedAt   emailId
//! ```
//!
//! Sorting by this key groups postings by field, then token, then arrival time,
//! so "all FROM tokens starting with `ali`" is one prefix scan.
//!
//! Tokens come from display names and subjects and can hold any character,
//! including `#`. The key stays reversible because `#RCVD#` is reserved:
//! [`PostingKey::new`] refuses tokens containing it, and neither the timestamp
//! nor the email id may contain `#`. [`PostingKey::decode`] therefore peels
//! `emailId` and `timestamp` off the right end and expects the marker right
//! before them, which holds even for a timestamp that reads `RCVD`.

pub mod tokenize;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use tokenize::{
    normalize_token, posting_keys, tokenize_address, tokenize_addresses, tokenize_text,
};

/// Prefix shared by every posting key.
pub const TOKEN_PREFIX: &str = "TOK#";

/// Reserved marker separating the token from the timestamp.
pub const RCVD_MARKER: &str = "#RCVD#";

/// The marker without its trailing delimiter.
const MARKER_HEAD: &str = "#RCVD";

/// Segment delimiter.
pub const DELIMITER: char = '#';

// ============================================================================
// TOKEN FIELD
// ============================================================================

/// Which part of an email a token was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenField {
    From,
    To,
    Cc,
    Bcc,
    Subject,
    Body,
}

impl TokenField {
    pub const ALL: [TokenField; 6] = [
        TokenField::From,
        TokenField::To,
        TokenField::Cc,
        TokenField::Bcc,
        TokenField::Subject,
        TokenField::Body,
    ];

    /// Upper-case name as written into keys.
    pub fn as_str(self) -> &'static str {
        match self {
            TokenField::From => "FROM",
            TokenField::To => "TO",
            TokenField::Cc => "CC",
            TokenField::Bcc => "BCC",
            TokenField::Subject => "SUBJECT",
            TokenField::Body => "BODY",
        }
    }

    /// Strict parse of the encoded (upper-case) form.
    fn from_key_segment(segment: &str) -> Option<Self> {
        TokenField::ALL.into_iter().find(|f| f.as_str() == segment)
    }

    /// Metadata attribute holding this field's tokens on stored vectors.
    pub fn metadata_attribute(self) -> &'static str {
        match self {
            TokenField::From => "fromTokens",
            TokenField::To => "toTokens",
            TokenField::Cc => "ccTokens",
            TokenField::Bcc => "bccTokens",
            TokenField::Subject => "subjectTokens",
            TokenField::Body => "bodyTokens",
        }
    }
}

impl fmt::Display for TokenField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive parse, for user input.
impl FromStr for TokenField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TokenField::from_key_segment(&s.trim().to_uppercase())
            .ok_or_else(|| Error::InvalidField(s.to_string()))
    }
}

// ============================================================================
// POSTING KEY
// ============================================================================

/// A validated (field, token, receivedAt, emailId) tuple.
///
/// # Invariants (enforced at construction)
/// - `token` is lower-case and the raw input never contained `#RCVD#`
/// - `received_at` and `document_id` are non-empty and contain no `#`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostingKey {
    field: TokenField,
    token: String,
    received_at: String,
    document_id: String,
}

impl PostingKey {
    /// Validate the parts of a posting key. The token is lower-cased.
    pub fn new(
        field: TokenField,
        token: &str,
        received_at: &str,
        document_id: &str,
    ) -> Result<Self> {
        if token.contains(RCVD_MARKER) {
            return Err(Error::InvalidToken {
                token: token.to_string(),
            });
        }
        check_part("receivedAt", received_at)?;
        check_part("documentId", document_id)?;

        Ok(PostingKey {
            field,
            token: token.to_lowercase(),
            received_at: received_at.to_string(),
            document_id: document_id.to_string(),
        })
    }

    pub fn field(&self) -> TokenField {
        self.field
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn received_at(&self) -> &str {
        &self.received_at
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Render the sort key. Pure: equal keys always render byte-identically.
    pub fn encode(&self) -> String {
        let mut key = String::with_capacity(
            TOKEN_PREFIX.len()
                + self.field.as_str().len()
                + self.token.len()
                + RCVD_MARKER.len()
                + self.received_at.len()
                + self.document_id.len()
                + 2,
        );
        key.push_str(TOKEN_PREFIX);
        key.push_str(self.field.as_str());
        key.push(DELIMITER);
        key.push_str(&self.token);
        key.push_str(RCVD_MARKER);
        key.push_str(&self.received_at);
        key.push(DELIMITER);
        key.push_str(&self.document_id);
        key
    }

    /// Parse a sort key produced by [`PostingKey::encode`].
    ///
    /// Reads from the right: the document id and the timestamp never contain
    /// `#`, so the last two segments are fixed and the marker must sit
    /// directly before them. Whatever lies between the field and that marker is
    /// the token, `#` and all.
    pub fn decode(key: &str) -> Result<Self> {
        let malformed = |reason| Error::MalformedKey {
            key: key.to_string(),
            reason,
        };

        let body = key
            .strip_prefix(TOKEN_PREFIX)
            .ok_or_else(|| malformed("missing TOK# prefix"))?;

        let mut segments = body.rsplitn(3, DELIMITER);
        let (document_id, received_at, head) =
            match (segments.next(), segments.next(), segments.next()) {
                (Some(id), Some(ts), Some(head)) => (id, ts, head),
                _ => return Err(malformed(missing_anchor_reason(body))),
            };
        let head = head
            .strip_suffix(MARKER_HEAD)
            .ok_or_else(|| malformed(missing_anchor_reason(body)))?;

        let (field, token) = head
            .split_once(DELIMITER)
            .ok_or_else(|| malformed("missing field delimiter"))?;
        let field = TokenField::from_key_segment(field).ok_or_else(|| malformed("unknown field"))?;

        if received_at.is_empty() {
            return Err(malformed("empty timestamp"));
        }
        if document_id.is_empty() {
            return Err(malformed("empty document id"));
        }

        Ok(PostingKey {
            field,
            token: token.to_string(),
            received_at: received_at.to_string(),
            document_id: document_id.to_string(),
        })
    }
}

/// Best description of a key whose tail is not `#RCVD#timestamp#id`.
fn missing_anchor_reason(body: &str) -> &'static str {
    match body.rfind(RCVD_MARKER) {
        Some(at) if !body[at + RCVD_MARKER.len()..].contains(DELIMITER) => "missing document id",
        _ => "missing #RCVD# anchor",
    }
}

fn check_part(part: &'static str, value: &str) -> Result<()> {
    if value.is_empty() || value.contains(DELIMITER) {
        return Err(Error::InvalidKeyPart {
            part,
            value: value.to_string(),
        });
    }
    Ok(())
}

impl fmt::Display for PostingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for PostingKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PostingKey::decode(s)
    }
}

// ============================================================================
// FREE FUNCTIONS
// ============================================================================

/// Encode a posting key in one call.
pub fn encode(
    field: TokenField,
    token: &str,
    received_at: &str,
    document_id: &str,
) -> Result<String> {
    Ok(PostingKey::new(field, token, received_at, document_id)?.encode())
}

/// Decode a posting key.
pub fn decode(key: &str) -> Result<PostingKey> {
    PostingKey::decode(key)
}

/// Build a range-scan prefix over posting keys.
///
/// - no field: `TOK#` (every posting; a token prefix alone is ignored since it
///   cannot be positioned without its field)
/// - field only: `TOK#FROM#`
/// - field and token prefix: `TOK#FROM#ali`
///
/// The token prefix is lower-cased to match what [`PostingKey::new`] stores.
pub fn prefix_for(field: Option<TokenField>, token_prefix: Option<&str>) -> String {
    let mut prefix = String::from(TOKEN_PREFIX);
    if let Some(field) = field {
        prefix.push_str(field.as_str());
        prefix.push(DELIMITER);
        if let Some(token_prefix) = token_prefix {
            prefix.push_str(&token_prefix.to_lowercase());
        }
    }
    prefix
}
