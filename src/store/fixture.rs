// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! JSON mailbox fixtures for the in-process backend.
//!
//! ```json
//! {
//!   "accounts": [
//!     { "accountId": "a1", "indexAll": true, "emails": [ { "emailId": "...", ... } ] }
//!   ]
//! }
//! ```
//!
//! With `indexAll` every email is queued for indexing on load; otherwise the
//! rows are stored exactly as written, including their `searchChunks`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{IndexAction, IndexMessage, IndexQueue, MemoryBackend};
use crate::email::EmailRecord;
use crate::error::{Error, Result};

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub accounts: Vec<FixtureAccount>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct FixtureAccount {
    pub account_id: String,
    #[serde(default)]
    pub index_all: bool,
    #[serde(default)]
    pub emails: Vec<EmailRecord>,
}

impl Fixture {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(json)?;
        for account in &fixture.accounts {
            if account.account_id.is_empty() {
                return Err(Error::InvalidRecord("fixture account without accountId".into()));
            }
        }
        Ok(fixture)
    }

    /// Write every account into `backend`, queueing index messages where asked.
    pub fn load_into(&self, backend: &MemoryBackend) -> Result<()> {
        for account in &self.accounts {
            for email in &account.emails {
                backend.put_email(&account.account_id, email)?;
                if account.index_all {
                    backend.enqueue(&IndexMessage {
                        account_id: account.account_id.clone(),
                        email_id: email.email_id.clone(),
                        action: IndexAction::Index,
                        api_url: None,
                    })?;
                }
            }
            info!(
                account = %account.account_id,
                emails = account.emails.len(),
                queued = account.index_all,
                "loaded fixture account"
            );
        }
        Ok(())
    }
}

impl MemoryBackend {
    /// Fresh backend populated from a fixture file.
    pub fn from_fixture(path: &Path) -> Result<Self> {
        let backend = MemoryBackend::new();
        Fixture::from_path(path)?.load_into(&backend)?;
        Ok(backend)
    }
}
