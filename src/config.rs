// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Harness configuration.
//!
//! Resolution order, lowest first: defaults, JSON file, `MAILSIFT_*`
//! environment, command-line flags. The CLI applies its own flags last.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::MAX_QUERY_LIMIT;

pub const ENV_TOP_K: &str = "MAILSIFT_TOP_K";
pub const ENV_QUERY_LIMIT: &str = "MAILSIFT_QUERY_LIMIT";
pub const ENV_POLL_ATTEMPTS: &str = "MAILSIFT_POLL_ATTEMPTS";
pub const ENV_POLL_INTERVAL_MS: &str = "MAILSIFT_POLL_INTERVAL_MS";
pub const ENV_API_URL: &str = "MAILSIFT_API_URL";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Nearest neighbours requested by the vector scenario.
    pub top_k: usize,
    /// Page size for query scenarios.
    pub query_limit: usize,
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
    /// Enqueue an index action even when the seed already has chunks.
    pub reindex: bool,
    /// Forwarded in index messages.
    pub api_url: Option<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            query_limit: MAX_QUERY_LIMIT,
            poll_attempts: 10,
            poll_interval_ms: 2000,
            reindex: false,
            api_url: None,
        }
    }
}

impl HarnessConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Override from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Override from any variable source.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_TOP_K) {
            self.top_k = parse_var(ENV_TOP_K, &v)?;
        }
        if let Some(v) = lookup(ENV_QUERY_LIMIT) {
            self.query_limit = parse_var(ENV_QUERY_LIMIT, &v)?;
        }
        if let Some(v) = lookup(ENV_POLL_ATTEMPTS) {
            self.poll_attempts = parse_var(ENV_POLL_ATTEMPTS, &v)?;
        }
        if let Some(v) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse_var(ENV_POLL_INTERVAL_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_API_URL) {
            self.api_url = (!v.is_empty()).then_some(v);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::Config("topK must be at least 1".into()));
        }
        if self.query_limit == 0 || self.query_limit > MAX_QUERY_LIMIT {
            return Err(Error::Config(format!(
                "queryLimit must be between 1 and {}",
                MAX_QUERY_LIMIT
            )));
        }
        if self.poll_attempts == 0 {
            return Err(Error::Config("pollAttempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{}: cannot parse '{}'", name, value)))
}
