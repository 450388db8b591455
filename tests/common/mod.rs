//! Shared test utilities and fixtures.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use mailsift::filter::{FilterNode, Operator};
use mailsift::store::{QueryEvaluator, QueryPage, QueryRequest};
use mailsift::MemoryBackend;

// Re-export canonical test utilities from mailsift::testing
pub use mailsift::testing::{
    backend_with, fast_config, index_message, make_address, make_email, make_seen_email,
    TEST_ACCOUNT,
};

// ============================================================================
// FIXTURES
// ============================================================================

/// Mailbox fixture checked into the repository.
pub const MAILBOX_FIXTURE: &str = "fixtures/mailbox.json";

/// Account whose emails are all queued for indexing on load.
pub const DEMO_ACCOUNT: &str = "acct-demo";

/// Richest seed: subject, sender, mailbox and keywords all present.
pub const DEMO_SEED: &str = "em-1001";

/// Account with one unindexed email and no keywords.
pub const FRESH_ACCOUNT: &str = "acct-fresh";
pub const FRESH_SEED: &str = "em-2001";

pub fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(MAILBOX_FIXTURE)
}

pub fn fixture_backend() -> MemoryBackend {
    MemoryBackend::from_fixture(&fixture_path()).expect("fixture loads")
}

// ============================================================================
// FAKE EVALUATORS
// ============================================================================

/// Accepts every filter and returns the same ids. Used to show that the
/// refusal scenarios actually catch a permissive evaluator.
pub struct AcceptAll {
    pub ids: Vec<String>,
}

impl QueryEvaluator for AcceptAll {
    fn evaluate(&self, _account_id: &str, request: &QueryRequest) -> mailsift::Result<QueryPage> {
        Ok(QueryPage {
            ids: self.ids.clone(),
            position: request.position,
            total: Some(self.ids.len()),
        })
    }
}

/// Fails every query with one fixed error kind.
pub struct AlwaysFails {
    pub kind: &'static str,
}

impl QueryEvaluator for AlwaysFails {
    fn evaluate(&self, _account_id: &str, _request: &QueryRequest) -> mailsift::Result<QueryPage> {
        Err(mailsift::Error::evaluator(self.kind, "forced failure"))
    }
}

// ============================================================================
// ORACLES
// ============================================================================

/// Reference rejection check written directly against the definition: after
/// normalization, any NOT or any OR with two or more children.
pub fn oracle_rejects(tree: &FilterNode) -> bool {
    fn contains_offender(node: &FilterNode) -> bool {
        match node {
            FilterNode::Condition(_) => false,
            FilterNode::Operator { op, children } => {
                let here = match op {
                    Operator::Not => true,
                    Operator::Or => children.len() >= 2,
                    Operator::And => false,
                };
                here || children.iter().any(contains_offender)
            }
        }
    }
    contains_offender(&oracle_normalize(tree))
}

/// Reference normalization: replace single-child ORs bottom-up.
pub fn oracle_normalize(tree: &FilterNode) -> FilterNode {
    match tree {
        FilterNode::Condition(c) => FilterNode::Condition(c.clone()),
        FilterNode::Operator { op, children } => {
            let children: Vec<FilterNode> = children.iter().map(oracle_normalize).collect();
            if *op == Operator::Or && children.len() == 1 {
                children.into_iter().next().expect("one child")
            } else {
                FilterNode::Operator {
                    op: *op,
                    children,
                }
            }
        }
    }
}

/// Whether the tree contains an OR with exactly one child anywhere.
pub fn has_single_child_or(tree: &FilterNode) -> bool {
    match tree {
        FilterNode::Condition(_) => false,
        FilterNode::Operator { op, children } => {
            (*op == Operator::Or && children.len() == 1)
                || children.iter().any(has_single_child_or)
        }
    }
}
