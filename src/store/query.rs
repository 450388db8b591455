// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Typed view of a flattened filter condition.
//!
//! The algebra only decides whether a tree is evaluable. Once flattened, each
//! predicate still has to be a known name with the right JSON type; this is
//! where unknown names become `unsupportedFilter` and bad values become
//! `invalidArguments`.

use serde_json::Value;

use crate::email::{ChunkKind, EmailRecord};
use crate::error::{kind::INVALID_ARGUMENTS, Error, Result};
use crate::filter::Condition;
use crate::keys::{normalize_token, tokenize_addresses, TokenField};

use super::MetadataFilter;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicates {
    pub text: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    /// Address predicates, value already normalized.
    pub addresses: Vec<(TokenField, String)>,
    pub in_mailbox: Option<String>,
    pub in_mailbox_other_than: Vec<String>,
    pub has_keyword: Option<String>,
    pub not_keyword: Option<String>,
    pub has_attachment: Option<bool>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl Predicates {
    pub fn parse(condition: &Condition) -> Result<Self> {
        let mut p = Predicates::default();
        for (name, value) in condition.iter() {
            match name.as_str() {
                "text" => p.text = Some(string(name, value)?),
                "subject" => p.subject = Some(string(name, value)?),
                "body" => p.body = Some(string(name, value)?),
                "from" => p.addresses.push((TokenField::From, address(name, value)?)),
                "to" => p.addresses.push((TokenField::To, address(name, value)?)),
                "cc" => p.addresses.push((TokenField::Cc, address(name, value)?)),
                "bcc" => p.addresses.push((TokenField::Bcc, address(name, value)?)),
                "inMailbox" => p.in_mailbox = Some(string(name, value)?),
                "inMailboxOtherThan" => p.in_mailbox_other_than = strings(name, value)?,
                "hasKeyword" => p.has_keyword = Some(string(name, value)?),
                "notKeyword" => p.not_keyword = Some(string(name, value)?),
                "hasAttachment" => p.has_attachment = Some(boolean(name, value)?),
                "minSize" => p.min_size = Some(unsigned(name, value)?),
                "maxSize" => p.max_size = Some(unsigned(name, value)?),
                "before" => p.before = Some(string(name, value)?),
                "after" => p.after = Some(string(name, value)?),
                other => {
                    return Err(Error::UnsupportedFilter(format!(
                        "unsupported filter property: {}",
                        other
                    )))
                }
            }
        }
        Ok(p)
    }

    /// Text for the embedding path. `subject` wins over `body`, `body` over
    /// `text`; `text` searches every chunk kind.
    pub fn search_text(&self) -> Option<(&str, Option<ChunkKind>)> {
        if let Some(subject) = self.subject.as_deref() {
            return Some((subject, Some(ChunkKind::Subject)));
        }
        if let Some(body) = self.body.as_deref() {
            return Some((body, Some(ChunkKind::Body)));
        }
        self.text.as_deref().map(|text| (text, None))
    }

    /// Equality filter over vector metadata for the exact-valued predicates.
    ///
    /// Address predicates are prefix matches, which an equality filter cannot
    /// express; [`Predicates::matches`] applies them to the candidates instead.
    pub fn metadata_filter(&self, kind: Option<ChunkKind>) -> MetadataFilter {
        let mut meta = MetadataFilter::new();
        if let Some(mailbox) = &self.in_mailbox {
            meta.insert("mailboxIds".into(), Value::from(mailbox.as_str()));
        }
        if let Some(keyword) = &self.has_keyword {
            meta.insert("keywords".into(), Value::from(keyword.as_str()));
        }
        if let Some(has_attachment) = self.has_attachment {
            meta.insert("hasAttachment".into(), Value::from(has_attachment));
        }
        if let Some(kind) = kind {
            meta.insert("type".into(), Value::from(kind.as_str()));
        }
        meta
    }

    /// Structural predicates against a stored record. Text predicates are
    /// answered by the embedding path and ignored here.
    pub fn matches(&self, record: &EmailRecord) -> bool {
        if let Some(mailbox) = &self.in_mailbox {
            if !record.mailbox_ids.get(mailbox).copied().unwrap_or(false) {
                return false;
            }
        }
        if self
            .in_mailbox_other_than
            .iter()
            .any(|m| record.mailbox_ids.get(m).copied().unwrap_or(false))
        {
            return false;
        }
        if let Some(keyword) = &self.has_keyword {
            if !record.keywords.get(keyword).copied().unwrap_or(false) {
                return false;
            }
        }
        if let Some(keyword) = &self.not_keyword {
            if record.keywords.get(keyword).copied().unwrap_or(false) {
                return false;
            }
        }
        if let Some(has_attachment) = self.has_attachment {
            if record.has_attachment != has_attachment {
                return false;
            }
        }
        if self.min_size.is_some_and(|min| record.size < min) {
            return false;
        }
        if self.max_size.is_some_and(|max| record.size >= max) {
            return false;
        }
        if let Some(before) = &self.before {
            if record.received_at.as_str() >= before.as_str() {
                return false;
            }
        }
        if let Some(after) = &self.after {
            if record.received_at.as_str() < after.as_str() {
                return false;
            }
        }
        self.addresses.iter().all(|(field, prefix)| {
            let addrs = match field {
                TokenField::From => &record.from,
                TokenField::To => &record.to,
                TokenField::Cc => &record.cc,
                TokenField::Bcc => &record.bcc,
                TokenField::Subject | TokenField::Body => return true,
            };
            tokenize_addresses(addrs)
                .iter()
                .any(|token| token.starts_with(prefix.as_str()))
        })
    }
}

fn invalid(name: &str, expected: &str) -> Error {
    Error::evaluator(
        INVALID_ARGUMENTS,
        format!("filter property '{}' must be {}", name, expected),
    )
}

fn string(name: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(name, "a string"))
}

fn address(name: &str, value: &Value) -> Result<String> {
    let raw = string(name, value)?;
    let token = normalize_token(raw.trim());
    if token.is_empty() {
        return Err(invalid(name, "a non-empty string"));
    }
    Ok(token)
}

fn strings(name: &str, value: &Value) -> Result<Vec<String>> {
    value
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| invalid(name, "an array of strings"))
}

fn boolean(name: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| invalid(name, "a boolean"))
}

fn unsigned(name: &str, value: &Value) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| invalid(name, "a non-negative integer"))
}
