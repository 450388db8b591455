// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Posting-key codec, filter algebra and conformance harness for a mailbox
//! search subsystem.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────────────┐
//! │    keys/     │   │   filter/    │   │          store/          │
//! │ (PostingKey, │   │ (FilterNode, │   │ (KeyValueStore, Embedder,│
//! │  tokenize)   │   │  classify)   │   │  SimilarityIndex, ...)   │
//! └──────┬───────┘   └──────┬───────┘   └────────────┬─────────────┘
//!        │                  │                        │
//!        ▼                  ▼                        ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           harness/                               │
//! │   seed ─► ensure indexed ─► plan (Ready | Skip | Fatal) ─► run    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Posting keys
//!
//! ```text
//! TOK#FROM#alice@example.com#RCVD#2024-01-01T00:00:00Z#em-1
//! └─┬┘ └┬─┘ └──────┬────────┘└─┬──┘└─────────┬────────┘ └┬─┘
//!  tag field     token      anchor      receivedAt     docId
//! ```
//!
//! Timestamps and ids never contain `#`, so decoding peels them off the right
//! and finds the marker directly before them. Tokens may contain `#` but never
//! the marker itself.
//!
//! # Filters
//!
//! The evaluator accepts conditions, `AND` at any depth, and `OR` only when
//! it has at most one child after normalization. [`classify`] predicts that
//! verdict without calling the evaluator.
//!
//! ```
//! use mailsift::{classify, FilterNode};
//!
//! let ok = FilterNode::and(vec![
//!     FilterNode::condition("inMailbox", "mb-1"),
//!     FilterNode::or(vec![FilterNode::condition("from", "alice")]),
//! ]);
//! assert!(classify(&ok).is_accepted());
//!
//! let refused = FilterNode::not(vec![FilterNode::condition("from", "alice")]);
//! assert!(!classify(&refused).is_accepted());
//! ```

pub mod config;
pub mod email;
pub mod error;
pub mod filter;
pub mod harness;
pub mod keys;
pub mod store;
pub mod testing;

pub use config::HarnessConfig;
pub use email::{EmailAddress, EmailRecord};
pub use error::{Error, Result};
pub use filter::{
    classify, describe, flatten, normalize, Classification, Condition, FilterNode, Operator,
    Rejection,
};
pub use harness::{Harness, Outcome, Report, Services};
pub use keys::{decode, encode, prefix_for, PostingKey, TokenField};
pub use store::MemoryBackend;
