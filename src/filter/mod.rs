// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Boolean filter trees and the shapes the query evaluator accepts.
//!
//! The evaluator only answers filters that flatten to a conjunction of simple
//! predicates, so every query stays a bounded intersection of index scans. This
//! module decides whether a tree has that shape, before anything is sent:
//!
//! | Shape (after normalization)     | Verdict                 |
//! |---------------------------------|-------------------------|
//! | condition                       | accepted                |
//! | `AND[...]` of accepted children | accepted                |
//! | `OR[x]`                         | collapses to `x`        |
//! | `OR[a, b, ...]` anywhere        | rejected (unsupported)  |
//! | `NOT[...]` anywhere             | rejected (unsupported)  |
//!
//! The verdict depends on shape only. Whether a leaf is answered by embeddings,
//! exact match or a posting scan never changes it.

mod flatten;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::kind::UNSUPPORTED_FILTER;

pub use flatten::flatten;

// ============================================================================
// TREE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    And,
    Or,
    Not,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaf predicate map, e.g. `{"inMailbox": "mb-1", "hasKeyword": "$seen"}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Condition(BTreeMap<String, Value>);

impl Condition {
    pub fn new() -> Self {
        Condition(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, predicate: &str, value: impl Into<Value>) -> Self {
        self.0.insert(predicate.to_string(), value.into());
        self
    }

    pub fn get(&self, predicate: &str) -> Option<&Value> {
        self.0.get(predicate)
    }

    pub fn insert(&mut self, predicate: String, value: Value) -> Option<Value> {
        self.0.insert(predicate, value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn predicates(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Condition {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Condition(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A filter tree. Closed: every consumer matches both variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireFilter", into = "WireFilter")]
pub enum FilterNode {
    Condition(Condition),
    Operator {
        op: Operator,
        children: Vec<FilterNode>,
    },
}

/// JMAP wire shape: `{"operator": "AND", "conditions": [...]}` or a plain map.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireFilter {
    Operator(WireOperator),
    Condition(Condition),
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireOperator {
    operator: Operator,
    conditions: Vec<FilterNode>,
}

impl From<WireFilter> for FilterNode {
    fn from(wire: WireFilter) -> Self {
        match wire {
            WireFilter::Operator(WireOperator {
                operator,
                conditions,
            }) => FilterNode::Operator {
                op: operator,
                children: conditions,
            },
            WireFilter::Condition(condition) => FilterNode::Condition(condition),
        }
    }
}

impl From<FilterNode> for WireFilter {
    fn from(node: FilterNode) -> Self {
        match node {
            FilterNode::Condition(condition) => WireFilter::Condition(condition),
            FilterNode::Operator { op, children } => WireFilter::Operator(WireOperator {
                operator: op,
                conditions: children,
            }),
        }
    }
}

impl From<Condition> for FilterNode {
    fn from(condition: Condition) -> Self {
        FilterNode::Condition(condition)
    }
}

impl FilterNode {
    /// Single-predicate condition.
    pub fn condition(predicate: &str, value: impl Into<Value>) -> Self {
        FilterNode::Condition(Condition::new().with(predicate, value))
    }

    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::Operator {
            op: Operator::And,
            children,
        }
    }

    pub fn or(children: Vec<FilterNode>) -> Self {
        FilterNode::Operator {
            op: Operator::Or,
            children,
        }
    }

    pub fn not(children: Vec<FilterNode>) -> Self {
        FilterNode::Operator {
            op: Operator::Not,
            children,
        }
    }

    /// Collapse every single-child `OR` into its child, bottom-up.
    pub fn normalize(self) -> Self {
        match self {
            FilterNode::Condition(condition) => FilterNode::Condition(condition),
            FilterNode::Operator { op, children } => {
                let mut children: Vec<FilterNode> =
                    children.into_iter().map(FilterNode::normalize).collect();
                if op == Operator::Or && children.len() == 1 {
                    return children.swap_remove(0);
                }
                FilterNode::Operator { op, children }
            }
        }
    }
}

/// Normalized copy of `tree`. Idempotent.
pub fn normalize(tree: &FilterNode) -> FilterNode {
    tree.clone().normalize()
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Why the evaluator will refuse a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotOperator,
    MultiChildOr { children: usize },
}

impl Rejection {
    /// Taxonomy code the evaluator answers with.
    pub fn kind(&self) -> &'static str {
        UNSUPPORTED_FILTER
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotOperator => f.write_str("NOT filter is not supported"),
            Rejection::MultiChildOr { children } => write!(
                f,
                "OR filter with multiple conditions is not supported ({} conditions)",
                children
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Accepted,
    Rejected(Rejection),
}

impl Classification {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Classification::Accepted)
    }
}

/// Predict whether the evaluator accepts `tree`.
///
/// Rejected iff the normalized tree holds a `NOT`, or an `OR` with two or more
/// children, at any depth. The first offender in pre-order is reported.
pub fn classify(tree: &FilterNode) -> Classification {
    match first_rejection(&normalize(tree)) {
        Some(rejection) => Classification::Rejected(rejection),
        None => Classification::Accepted,
    }
}

fn first_rejection(node: &FilterNode) -> Option<Rejection> {
    match node {
        FilterNode::Condition(_) => None,
        FilterNode::Operator { op, children } => {
            match op {
                Operator::Not => return Some(Rejection::NotOperator),
                Operator::Or if children.len() > 1 => {
                    return Some(Rejection::MultiChildOr {
                        children: children.len(),
                    })
                }
                Operator::And | Operator::Or => {}
            }
            children.iter().find_map(first_rejection)
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

/// Canonical compact rendering of the normalized tree.
///
/// Conditions render as compact JSON with sorted keys, operators as
/// `AND[child,child]`. Trees that normalize alike render alike.
pub fn describe(tree: &FilterNode) -> String {
    let mut out = String::new();
    render(&normalize(tree), &mut out);
    out
}

fn render(node: &FilterNode, out: &mut String) {
    match node {
        FilterNode::Condition(condition) => {
            out.push('{');
            for (i, (predicate, value)) in condition.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(predicate.clone()).to_string());
                out.push(':');
                out.push_str(&value.to_string());
            }
            out.push('}');
        }
        FilterNode::Operator { op, children } => {
            out.push_str(op.as_str());
            out.push('[');
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                render(child, out);
            }
            out.push(']');
        }
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&describe(self))
    }
}
