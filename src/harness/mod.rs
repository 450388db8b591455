// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! End-to-end conformance run against one seed email.
//!
//! ```text
//! load seed ──► ensure indexed ──► plan (all preconditions, no I/O)
//!                     │                    │
//!                  fatal?               fatal? ──► abort
//!                                          │
//!                               execute Ready scenarios in order
//!                                          │
//!                                       Report
//! ```
//!
//! Everything is sequential. The only loop with a delay is the indexing poll.
//! A scenario that errors fails on its own; only seed-level problems abort.

pub mod report;
pub mod scenario;
pub mod seed;

use std::collections::BTreeSet;
use std::thread;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::email::{account_pk, email_sk, index_name, EmailRecord};
use crate::error::{Error, Result};
use crate::keys::{prefix_for, PostingKey};
use crate::store::{
    scan_all, Embedder, IndexAction, IndexMessage, IndexQueue, KeyValueStore, QueryEvaluator,
    QueryRequest, SimilarityIndex,
};

pub use report::{Outcome, Report, ScenarioResult};
pub use scenario::{plan, Expectation, Precondition, Scenario, ScenarioInput};
pub use seed::SeedFacts;

/// The services a run talks to. Each may be a different implementation.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub store: &'a dyn KeyValueStore,
    pub embedder: &'a dyn Embedder,
    pub index: &'a dyn SimilarityIndex,
    pub evaluator: &'a dyn QueryEvaluator,
    pub queue: &'a dyn IndexQueue,
}

impl<'a> Services<'a> {
    /// All five contracts from one backend.
    pub fn from_backend<B>(backend: &'a B) -> Self
    where
        B: KeyValueStore + Embedder + SimilarityIndex + QueryEvaluator + IndexQueue,
    {
        Self {
            store: backend,
            embedder: backend,
            index: backend,
            evaluator: backend,
            queue: backend,
        }
    }
}

pub struct Harness<'a> {
    services: Services<'a>,
    config: HarnessConfig,
}

impl<'a> Harness<'a> {
    pub fn new(services: Services<'a>, config: HarnessConfig) -> Self {
        Self { services, config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Full run. `Err` only for fatal preconditions and invalid config;
    /// scenario failures land in the report.
    pub fn run(&self, account_id: &str, email_id: &str) -> Result<Report> {
        self.config.validate()?;
        let seed = self.load_seed(account_id, email_id)?;
        let seed = self.ensure_indexed(account_id, seed)?;
        let facts = SeedFacts::from_record(&seed);

        let preconditions = plan(&facts);
        let mut ready = Vec::new();
        let mut report = Report::new(account_id, email_id);
        for precondition in preconditions {
            match precondition {
                Precondition::Fatal(e) => return Err(e),
                Precondition::Skip {
                    number,
                    description,
                    reason,
                } => report.push(number, description, Outcome::Skipped(reason)),
                Precondition::Ready(scenario) => ready.push(scenario),
            }
        }

        for scenario in &ready {
            let outcome = self.execute(account_id, scenario);
            match &outcome {
                Outcome::Failed(detail) => warn!(
                    scenario = scenario.number,
                    detail = %detail,
                    "scenario failed"
                ),
                _ => info!(scenario = scenario.number, "scenario passed"),
            }
            report.push(scenario.number, scenario.description, outcome);
        }
        report.results.sort_by_key(|r| r.number);

        info!(
            account = %account_id,
            email = %email_id,
            summary = %report.summary(),
            "conformance run finished"
        );
        Ok(report)
    }

    pub fn load_seed(&self, account_id: &str, email_id: &str) -> Result<EmailRecord> {
        let item = self
            .services
            .store
            .get(&account_pk(account_id), &email_sk(email_id))?
            .ok_or_else(|| Error::SeedNotFound {
                account_id: account_id.to_string(),
                email_id: email_id.to_string(),
            })?;
        EmailRecord::from_item(&item)
    }

    /// Make sure the seed has indexed chunks, enqueueing and polling if not.
    pub fn ensure_indexed(&self, account_id: &str, seed: EmailRecord) -> Result<EmailRecord> {
        if seed.search_chunks > 0 && !self.config.reindex {
            debug!(email = %seed.email_id, chunks = seed.search_chunks, "seed already indexed");
            return Ok(seed);
        }

        let ack = self.services.queue.enqueue(&IndexMessage {
            account_id: account_id.to_string(),
            email_id: seed.email_id.clone(),
            action: IndexAction::Index,
            api_url: self.config.api_url.clone(),
        })?;
        info!(email = %seed.email_id, ack = %ack, "requested indexing of seed");

        for attempt in 1..=self.config.poll_attempts {
            thread::sleep(self.config.poll_interval());
            let current = self.load_seed(account_id, &seed.email_id)?;
            if current.search_chunks > 0 {
                info!(
                    email = %seed.email_id,
                    chunks = current.search_chunks,
                    attempt,
                    "seed indexed"
                );
                return Ok(current);
            }
            debug!(email = %seed.email_id, attempt, "seed not indexed yet");
        }

        Err(Error::NeverIndexed {
            email_id: seed.email_id,
            attempts: self.config.poll_attempts,
        })
    }

    /// Dispatch one scenario and score the response.
    pub fn execute(&self, account_id: &str, scenario: &Scenario) -> Outcome {
        debug!(
            scenario = scenario.number,
            path = scenario.input.path(),
            input = %scenario.input,
            "executing scenario"
        );
        let response = match &scenario.input {
            ScenarioInput::Vector { text } => self.vector_ids(account_id, text),
            ScenarioInput::Query { filter } => self
                .services
                .evaluator
                .evaluate(
                    account_id,
                    &QueryRequest {
                        filter: filter.clone(),
                        position: 0,
                        limit: self.config.query_limit,
                    },
                )
                .map(|page| page.ids),
            ScenarioInput::KeywordScan { field, prefix } => {
                self.scan_ids(account_id, prefix_for(Some(*field), Some(prefix.as_str())))
            }
        };
        score(&scenario.expected, response)
    }

    fn vector_ids(&self, account_id: &str, text: &str) -> Result<Vec<String>> {
        let vector = self.services.embedder.embed(text)?;
        let matches = self.services.index.query(
            &index_name(account_id),
            &vector,
            self.config.top_k,
            None,
        )?;
        Ok(matches
            .iter()
            .filter_map(|m| m.metadata.get("emailId").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    fn scan_ids(&self, account_id: &str, prefix: String) -> Result<Vec<String>> {
        let items = scan_all(self.services.store, &account_pk(account_id), &prefix)?;
        let mut ids = BTreeSet::new();
        for item in items {
            ids.insert(PostingKey::decode(&item.sk)?.document_id().to_string());
        }
        Ok(ids.into_iter().collect())
    }
}

/// Compare a response against the expectation.
pub fn score(expected: &Expectation, response: Result<Vec<String>>) -> Outcome {
    match (expected, response) {
        (Expectation::Contains(id), Ok(ids)) => {
            if ids.iter().any(|r| r == id) {
                Outcome::Passed(format!("seed found in {} result(s)", ids.len()))
            } else {
                Outcome::Failed(format!("seed {} missing from {} result(s)", id, ids.len()))
            }
        }
        (Expectation::Contains(_), Err(e)) => {
            Outcome::Failed(format!("unexpected error [{}]: {}", e.kind(), e))
        }
        (Expectation::Rejects(kind), Ok(ids)) => Outcome::Failed(format!(
            "expected {} but the query was accepted with {} result(s)",
            kind,
            ids.len()
        )),
        (Expectation::Rejects(kind), Err(e)) if e.kind() == kind.as_str() => {
            Outcome::Passed(format!("refused with {}", kind))
        }
        (Expectation::Rejects(kind), Err(e)) => Outcome::Failed(format!(
            "expected {} but got [{}]: {}",
            kind,
            e.kind(),
            e
        )),
    }
}
