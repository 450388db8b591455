// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Merge an accepted tree into one flat condition.

use serde_json::Value;

use super::{classify, Classification, Condition, FilterNode, Operator};
use crate::error::{Error, Result};

/// Flatten `tree` into a single condition the evaluator can run.
///
/// `AND` children are merged key by key: arrays concatenate, equal scalars are
/// kept once, differing scalars are a conflict. Returns `Ok(None)` when an empty
/// `OR` makes the conjunction unsatisfiable.
pub fn flatten(tree: &FilterNode) -> Result<Option<Condition>> {
    if let Classification::Rejected(rejection) = classify(tree) {
        return Err(Error::UnsupportedFilter(rejection.to_string()));
    }
    flatten_node(&tree.clone().normalize())
}

fn flatten_node(node: &FilterNode) -> Result<Option<Condition>> {
    match node {
        FilterNode::Condition(condition) => Ok(Some(condition.clone())),
        FilterNode::Operator {
            op: Operator::And,
            children,
        } => {
            let mut merged = Condition::new();
            for child in children {
                match flatten_node(child)? {
                    Some(condition) => merge_into(&mut merged, condition)?,
                    None => return Ok(None),
                }
            }
            Ok(Some(merged))
        }
        // Normalized and accepted: an OR left here has no children.
        FilterNode::Operator {
            op: Operator::Or,
            children,
        } => match children.as_slice() {
            [] => Ok(None),
            [only] => flatten_node(only),
            _ => Err(Error::UnsupportedFilter(
                "OR filter with multiple conditions is not supported".to_string(),
            )),
        },
        FilterNode::Operator {
            op: Operator::Not, ..
        } => Err(Error::UnsupportedFilter(
            "NOT filter is not supported".to_string(),
        )),
    }
}

fn merge_into(dst: &mut Condition, src: Condition) -> Result<()> {
    for (predicate, value) in src.iter() {
        let merged = match dst.get(predicate) {
            None => value.clone(),
            Some(Value::Array(existing)) if value.is_array() => {
                let mut joined = existing.clone();
                if let Value::Array(extra) = value {
                    joined.extend(extra.iter().cloned());
                }
                Value::Array(joined)
            }
            Some(existing) if existing == value => continue,
            Some(_) => {
                return Err(Error::UnsupportedFilter(format!(
                    "conflicting values for filter property: {}",
                    predicate
                )))
            }
        };
        dst.insert(predicate.clone(), merged);
    }
    Ok(())
}
