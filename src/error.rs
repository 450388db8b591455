// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! One error type for the whole crate, and the taxonomy codes it maps to.
//!
//! The query evaluator speaks in JMAP-style error kinds (`unsupportedFilter`,
//! `invalidArguments`, `serverFail`). The harness compares those strings exactly,
//! so every variant here knows which code it stands for via [`Error::kind`].

use thiserror::Error;

/// Taxonomy codes shared by the codec, the evaluator and the harness.
pub mod kind {
    pub const INVALID_TOKEN: &str = "invalidToken";
    pub const MALFORMED_KEY: &str = "malformedKey";
    pub const INVALID_ARGUMENTS: &str = "invalidArguments";
    pub const INDEX_NOT_FOUND: &str = "indexNotFound";
    pub const UNSUPPORTED_FILTER: &str = "unsupportedFilter";
    pub const PRECONDITION_FAILED: &str = "preconditionFailed";
    pub const SERVER_FAIL: &str = "serverFail";
}

#[derive(Debug, Error)]
pub enum Error {
    /// Token carries the reserved `#RCVD#` marker.
    #[error("token '{token}' contains the reserved marker '#RCVD#'")]
    InvalidToken { token: String },

    /// Timestamp or document id cannot be placed in a posting key.
    #[error("invalid {part} '{value}': must be non-empty and free of '#'")]
    InvalidKeyPart { part: &'static str, value: String },

    #[error("unknown token field '{0}'")]
    InvalidField(String),

    #[error("malformed posting key '{key}': {reason}")]
    MalformedKey { key: String, reason: &'static str },

    #[error("vector index '{0}' not found")]
    IndexNotFound(String),

    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Any other failure declared by the query evaluator.
    #[error("evaluator error [{kind}]: {description}")]
    Evaluator { kind: String, description: String },

    #[error("seed email '{email_id}' not found in account '{account_id}'")]
    SeedNotFound { account_id: String, email_id: String },

    #[error("email '{email_id}' still has no indexed chunks after {attempts} polls")]
    NeverIndexed { email_id: String, attempts: u32 },

    #[error("invalid email record: {0}")]
    InvalidRecord(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an evaluator-declared error.
    pub fn evaluator(kind: &str, description: impl Into<String>) -> Self {
        Error::Evaluator {
            kind: kind.to_string(),
            description: description.into(),
        }
    }

    /// Taxonomy code for this error, compared by string equality.
    pub fn kind(&self) -> &str {
        match self {
            Error::InvalidToken { .. } => kind::INVALID_TOKEN,
            Error::InvalidKeyPart { .. } | Error::InvalidField(_) => kind::INVALID_ARGUMENTS,
            Error::MalformedKey { .. } => kind::MALFORMED_KEY,
            Error::IndexNotFound(_) => kind::INDEX_NOT_FOUND,
            Error::UnsupportedFilter(_) => kind::UNSUPPORTED_FILTER,
            Error::Evaluator { kind, .. } => kind,
            Error::SeedNotFound { .. } | Error::NeverIndexed { .. } => kind::PRECONDITION_FAILED,
            Error::InvalidRecord(_) | Error::Config(_) | Error::Io(_) | Error::Json(_) => {
                kind::SERVER_FAIL
            }
        }
    }

    /// Errors that abort a conformance run instead of failing one scenario.
    pub fn is_fatal_precondition(&self) -> bool {
        matches!(self, Error::SeedNotFound { .. } | Error::NeverIndexed { .. })
    }
}
