// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The facts scenarios are derived from.

use crate::email::EmailRecord;
use crate::keys::normalize_token;

/// What the seed document offers to build scenarios from. Each optional fact
/// gates the scenarios that need it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeedFacts {
    pub email_id: String,
    pub received_at: String,
    /// Trimmed subject, `None` when blank.
    pub subject: Option<String>,
    pub first_subject_word: Option<String>,
    /// Full address of the first sender.
    pub sender: Option<String>,
    /// Local part in token form, as the indexer writes it into FROM postings.
    pub sender_local_part: Option<String>,
    pub mailbox: Option<String>,
    pub keyword: Option<String>,
}

impl SeedFacts {
    pub fn from_record(record: &EmailRecord) -> Self {
        let subject = Some(record.subject.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let sender = record.first_sender().filter(|a| !a.email.is_empty());

        Self {
            email_id: record.email_id.clone(),
            received_at: record.received_at.clone(),
            subject,
            first_subject_word: record.subject_words().into_iter().next(),
            sender: sender.map(|a| a.email.clone()),
            sender_local_part: sender
                .and_then(|a| a.local_part())
                .map(normalize_token)
                .filter(|p| !p.is_empty()),
            mailbox: record.first_mailbox().map(str::to_string),
            keyword: record.first_keyword().map(str::to_string),
        }
    }
}
