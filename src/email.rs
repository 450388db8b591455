// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Stored email records and the keys they live under.
//!
//! An account is one partition (`ACCOUNT#<id>`). Email rows sit at `EMAIL#<id>`,
//! posting rows at `TOK#...` in the same partition. Vectors live in a separate
//! similarity index named `acct-<id>`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::keys::tokenize_text;
use crate::store::Item;

pub const ACCOUNT_PREFIX: &str = "ACCOUNT#";
pub const EMAIL_PREFIX: &str = "EMAIL#";
pub const INDEX_PREFIX: &str = "acct-";

/// Body chunks are cut at this many words.
pub const CHUNK_WORDS: usize = 200;

pub fn account_pk(account_id: &str) -> String {
    format!("{}{}", ACCOUNT_PREFIX, account_id)
}

pub fn email_sk(email_id: &str) -> String {
    format!("{}{}", EMAIL_PREFIX, email_id)
}

/// Similarity index name for an account.
pub fn index_name(account_id: &str) -> String {
    format!("{}{}", INDEX_PREFIX, account_id)
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct EmailAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

impl EmailAddress {
    /// Local part, before the last `@`.
    pub fn local_part(&self) -> Option<&str> {
        match self.email.rfind('@') {
            Some(at) if at > 0 => Some(&self.email[..at]),
            _ => None,
        }
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => write!(f, "{} <{}>", name, self.email),
            _ => f.write_str(&self.email),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecord {
    pub email_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from: Vec<EmailAddress>,
    #[serde(default)]
    pub to: Vec<EmailAddress>,
    #[serde(default)]
    pub cc: Vec<EmailAddress>,
    #[serde(default)]
    pub bcc: Vec<EmailAddress>,
    #[serde(default)]
    pub mailbox_ids: BTreeMap<String, bool>,
    #[serde(default)]
    pub keywords: BTreeMap<String, bool>,
    pub received_at: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub has_attachment: bool,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub body: String,
    /// Number of vector chunks written by the indexer; zero means not indexed.
    #[serde(default)]
    pub search_chunks: u32,
}

/// Which text a vector chunk was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Subject,
    Body,
}

impl ChunkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkKind::Subject => "subject",
            ChunkKind::Body => "body",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub kind: ChunkKind,
    pub text: String,
}

impl EmailRecord {
    pub fn from_item(item: &Item) -> Result<Self> {
        serde_json::from_value(Value::Object(item.clone()))
            .map_err(|e| Error::InvalidRecord(e.to_string()))
    }

    pub fn to_item(&self) -> Result<Item> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::InvalidRecord(format!(
                "expected an object, got {}",
                other
            ))),
        }
    }

    pub fn first_sender(&self) -> Option<&EmailAddress> {
        self.from.first()
    }

    /// First mailbox the email is a member of, in id order.
    pub fn first_mailbox(&self) -> Option<&str> {
        self.mailbox_ids
            .iter()
            .find(|(_, member)| **member)
            .map(|(id, _)| id.as_str())
    }

    /// First keyword that is set, in keyword order.
    pub fn first_keyword(&self) -> Option<&str> {
        self.keywords
            .iter()
            .find(|(_, set)| **set)
            .map(|(kw, _)| kw.as_str())
    }

    pub fn mailbox_list(&self) -> Vec<&str> {
        self.mailbox_ids
            .iter()
            .filter(|(_, member)| **member)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn keyword_list(&self) -> Vec<&str> {
        self.keywords
            .iter()
            .filter(|(_, set)| **set)
            .map(|(kw, _)| kw.as_str())
            .collect()
    }

    /// Split into one subject chunk and body chunks of at most `max_words` words.
    pub fn chunks(&self, max_words: usize) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        if !self.subject.trim().is_empty() {
            chunks.push(Chunk {
                index: 0,
                kind: ChunkKind::Subject,
                text: self.subject.trim().to_string(),
            });
        }

        let words: Vec<&str> = self.body.split_whitespace().collect();
        for window in words.chunks(max_words.max(1)) {
            chunks.push(Chunk {
                index: chunks.len(),
                kind: ChunkKind::Body,
                text: window.join(" "),
            });
        }
        chunks
    }

    pub fn subject_words(&self) -> Vec<String> {
        tokenize_text(&self.subject)
    }
}
