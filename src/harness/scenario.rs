// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The fixed scenario matrix and its preconditions.
//!
//! | # | path   | input                                 | needs            |
//! |---|--------|---------------------------------------|------------------|
//! | 1 | vector | subject text                          | subject          |
//! | 2 | query  | `{text: subject}`                     | subject          |
//! | 3 | query  | `{from: sender}`                      | sender           |
//! | 4 | query  | `{inMailbox}`                         | mailbox          |
//! | 5 | query  | `{hasKeyword}`                        | keyword          |
//! | 6 | query  | `AND[inMailbox, hasKeyword]`          | mailbox, keyword |
//! | 7 | query  | `OR[{text: subject}]`                 | subject          |
//! | 8 | query  | `AND[inMailbox, OR[from]]`            | mailbox, sender  |
//! | 9 | query  | `OR[from alice, from bob]`            | nothing          |
//! | 10| query  | `NOT[from alice]`                     | nothing          |
//! | 11| scan   | FROM postings, sender local part      | sender           |
//! | 12| scan   | SUBJECT postings, first subject word  | subject word     |
//!
//! Numbers are stable across releases. Scenarios 9 and 10 use fixed example
//! addresses: what they check is structural rejection, not matching.

use std::fmt;

use crate::error::Error;
use crate::filter::{classify, Classification, FilterNode};
use crate::keys::{PostingKey, TokenField};

use super::seed::SeedFacts;

pub const SCENARIO_COUNT: u32 = 12;

const REJECT_ADDRESS_A: &str = "alice@example.com";
const REJECT_ADDRESS_B: &str = "bob@example.com";

#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioInput {
    /// Embed the text and query the account's similarity index.
    Vector { text: String },
    /// Send the tree to the query evaluator.
    Query { filter: FilterNode },
    /// Prefix-scan posting keys of one field.
    KeywordScan { field: TokenField, prefix: String },
}

impl ScenarioInput {
    pub fn path(&self) -> &'static str {
        match self {
            ScenarioInput::Vector { .. } => "vector",
            ScenarioInput::Query { .. } => "query",
            ScenarioInput::KeywordScan { .. } => "scan",
        }
    }
}

impl fmt::Display for ScenarioInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioInput::Vector { text } => write!(f, "{:?}", text),
            ScenarioInput::Query { filter } => write!(f, "{}", filter),
            ScenarioInput::KeywordScan { field, prefix } => write!(f, "{}:{}*", field, prefix),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// Accepted, and the seed id is among the results.
    Contains(String),
    /// Refused with exactly this error kind.
    Rejects(String),
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Contains(id) => write!(f, "contains {}", id),
            Expectation::Rejects(kind) => write!(f, "rejects {}", kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub number: u32,
    pub description: &'static str,
    pub input: ScenarioInput,
    pub expected: Expectation,
}

/// Result of checking a scenario's preconditions against the seed.
#[derive(Debug)]
pub enum Precondition {
    Ready(Scenario),
    Skip {
        number: u32,
        description: &'static str,
        reason: String,
    },
    /// The seed cannot be tested at all; aborts the run.
    Fatal(Error),
}

pub fn description(number: u32) -> &'static str {
    match number {
        1 => "vector search by subject",
        2 => "query text = subject",
        3 => "query from = sender",
        4 => "query inMailbox",
        5 => "query hasKeyword",
        6 => "query AND[inMailbox, hasKeyword]",
        7 => "query single-child OR[text]",
        8 => "query AND[inMailbox, OR[from]]",
        9 => "query OR[from, from] is refused",
        10 => "query NOT[from] is refused",
        11 => "scan FROM postings by sender local part",
        12 => "scan SUBJECT postings by first subject word",
        _ => "unknown scenario",
    }
}

/// Expected verdict for a filter, predicted by the algebra.
pub fn expectation_for(filter: &FilterNode, seed_id: &str) -> Expectation {
    match classify(filter) {
        Classification::Accepted => Expectation::Contains(seed_id.to_string()),
        Classification::Rejected(rejection) => Expectation::Rejects(rejection.kind().to_string()),
    }
}

/// Assess every scenario, in order, without touching any service.
pub fn plan(seed: &SeedFacts) -> Vec<Precondition> {
    (1..=SCENARIO_COUNT).map(|n| assess(seed, n)).collect()
}

pub fn assess(seed: &SeedFacts, number: u32) -> Precondition {
    let subject = seed.subject.as_deref();
    let sender = seed.sender.as_deref();
    let mailbox = seed.mailbox.as_deref();
    let keyword = seed.keyword.as_deref();

    let input = match number {
        1 => subject.map(|s| ScenarioInput::Vector { text: s.to_string() }),
        2 => subject.map(|s| query(FilterNode::condition("text", s))),
        3 => sender.map(|s| query(FilterNode::condition("from", s))),
        4 => mailbox.map(|m| query(FilterNode::condition("inMailbox", m))),
        5 => keyword.map(|k| query(FilterNode::condition("hasKeyword", k))),
        6 => mailbox.zip(keyword).map(|(m, k)| {
            query(FilterNode::and(vec![
                FilterNode::condition("inMailbox", m),
                FilterNode::condition("hasKeyword", k),
            ]))
        }),
        7 => subject.map(|s| query(FilterNode::or(vec![FilterNode::condition("text", s)]))),
        8 => mailbox.zip(sender).map(|(m, s)| {
            query(FilterNode::and(vec![
                FilterNode::condition("inMailbox", m),
                FilterNode::or(vec![FilterNode::condition("from", s)]),
            ]))
        }),
        9 => Some(query(FilterNode::or(vec![
            FilterNode::condition("from", REJECT_ADDRESS_A),
            FilterNode::condition("from", REJECT_ADDRESS_B),
        ]))),
        10 => Some(query(FilterNode::not(vec![FilterNode::condition(
            "from",
            REJECT_ADDRESS_A,
        )]))),
        11 => {
            if sender.is_some() && seed.sender_local_part.is_none() {
                return skip(number, "sender address has no local part");
            }
            seed.sender_local_part
                .as_deref()
                .map(|p| scan(TokenField::From, p))
        }
        12 => seed
            .first_subject_word
            .as_deref()
            .map(|w| scan(TokenField::Subject, w)),
        _ => return skip(number, "no such scenario"),
    };

    let Some(input) = input else {
        return skip(number, missing_fact(number));
    };

    // A scan prefix must be something the seed's own postings could carry.
    // A bad prefix only rules out this scan; a seed whose own id or timestamp
    // cannot form a posting key can never have been indexed.
    if let ScenarioInput::KeywordScan { field, prefix } = &input {
        match PostingKey::new(*field, prefix, &seed.received_at, &seed.email_id) {
            Ok(_) => {}
            Err(Error::InvalidToken { .. }) => {
                return skip(number, "scan prefix cannot form a posting key")
            }
            Err(e) => return Precondition::Fatal(e),
        }
    }

    let expected = match &input {
        ScenarioInput::Query { filter } => expectation_for(filter, &seed.email_id),
        ScenarioInput::Vector { .. } | ScenarioInput::KeywordScan { .. } => {
            Expectation::Contains(seed.email_id.clone())
        }
    };
    Precondition::Ready(Scenario {
        number,
        description: description(number),
        input,
        expected,
    })
}

fn query(filter: FilterNode) -> ScenarioInput {
    ScenarioInput::Query { filter }
}

fn scan(field: TokenField, prefix: &str) -> ScenarioInput {
    ScenarioInput::KeywordScan {
        field,
        prefix: prefix.to_string(),
    }
}

fn skip(number: u32, reason: &str) -> Precondition {
    Precondition::Skip {
        number,
        description: description(number),
        reason: reason.to_string(),
    }
}

fn missing_fact(number: u32) -> &'static str {
    match number {
        1 | 2 | 7 => "seed has no subject",
        3 | 11 => "seed has no sender",
        4 => "seed is in no mailbox",
        5 => "seed has no keywords",
        6 => "seed needs both a mailbox and a keyword",
        8 => "seed needs both a mailbox and a sender",
        12 => "seed subject has no words",
        _ => "missing seed data",
    }
}
