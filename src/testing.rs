// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Test utilities shared across unit and integration tests.
//!
//! This module is always compiled but hidden from documentation.

#![doc(hidden)]

use crate::config::HarnessConfig;
use crate::email::{EmailAddress, EmailRecord};
use crate::store::{IndexAction, IndexMessage, IndexQueue, MemoryBackend};

pub const TEST_ACCOUNT: &str = "acct-test";

pub fn make_address(name: Option<&str>, email: &str) -> EmailAddress {
    EmailAddress {
        name: name.map(str::to_string),
        email: email.to_string(),
    }
}

/// An email in `mb-inbox` with one sender and a short body.
pub fn make_email(id: &str, subject: &str, from: &str, received_at: &str) -> EmailRecord {
    EmailRecord {
        email_id: id.to_string(),
        subject: subject.to_string(),
        from: vec![make_address(None, from)],
        to: vec![make_address(Some("Test User"), "me@example.net")],
        mailbox_ids: [("mb-inbox".to_string(), true)].into_iter().collect(),
        received_at: received_at.to_string(),
        size: 1024,
        preview: format!("Preview of {}", subject),
        body: format!("Body of the message about {}", subject.to_lowercase()),
        ..Default::default()
    }
}

/// Same as [`make_email`] with a `$seen` keyword.
pub fn make_seen_email(id: &str, subject: &str, from: &str, received_at: &str) -> EmailRecord {
    let mut email = make_email(id, subject, from, received_at);
    email.keywords.insert("$seen".to_string(), true);
    email
}

pub fn index_message(account_id: &str, email_id: &str) -> IndexMessage {
    IndexMessage {
        account_id: account_id.to_string(),
        email_id: email_id.to_string(),
        action: IndexAction::Index,
        api_url: None,
    }
}

/// Store `emails` under [`TEST_ACCOUNT`]. With `index`, queue each for indexing.
pub fn backend_with(emails: &[EmailRecord], index: bool) -> MemoryBackend {
    let backend = MemoryBackend::new();
    for email in emails {
        backend
            .put_email(TEST_ACCOUNT, email)
            .expect("test email serializes");
        if index {
            backend
                .enqueue(&index_message(TEST_ACCOUNT, &email.email_id))
                .expect("in-memory enqueue");
        }
    }
    backend
}

/// Config that polls without sleeping.
pub fn fast_config() -> HarnessConfig {
    HarnessConfig {
        poll_attempts: 3,
        poll_interval_ms: 0,
        ..Default::default()
    }
}
