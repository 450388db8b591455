// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Narrow contracts to the services around the search subsystem.
//!
//! The harness only ever talks to these traits. Production deployments put a
//! key-value table, an embedding model, a vector index, a query endpoint and an
//! indexing queue behind them; [`memory::MemoryBackend`] implements all five in
//! process.
//!
//! Every method takes `&self` and returns a [`Result`]; there are no retries or
//! timeouts at this layer.

pub mod fixture;
pub mod memory;
pub mod query;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::filter::FilterNode;

pub use memory::MemoryBackend;

/// Attribute map of one stored row.
pub type Item = Map<String, Value>;

/// Metadata filter for similarity queries: attribute → required value.
/// A list-valued attribute matches when it contains the value.
pub type MetadataFilter = Map<String, Value>;

/// The evaluator never returns more than this many ids per page.
pub const MAX_QUERY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub pk: String,
    pub sk: String,
    pub attributes: Item,
}

/// One page of a prefix scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Pass back to `scan_prefix` to continue; `None` on the last page.
    pub continuation: Option<String>,
}

pub trait KeyValueStore {
    fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>>;

    /// Items of partition `pk` whose sort key starts with `sk_prefix`, ascending.
    fn scan_prefix(
        &self,
        pk: &str,
        sk_prefix: &str,
        continuation: Option<&str>,
    ) -> Result<Page<StoredItem>>;
}

/// Follow continuations until the scan is exhausted.
pub fn scan_all<S: KeyValueStore + ?Sized>(
    store: &S,
    pk: &str,
    sk_prefix: &str,
) -> Result<Vec<StoredItem>> {
    let mut items = Vec::new();
    let mut continuation: Option<String> = None;
    loop {
        let page = store.scan_prefix(pk, sk_prefix, continuation.as_deref())?;
        items.extend(page.items);
        match page.continuation {
            Some(next) => continuation = Some(next),
            None => return Ok(items),
        }
    }
}

pub trait Embedder {
    /// Length of every vector `embed` returns.
    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub key: String,
    pub distance: f32,
    pub metadata: Item,
}

pub trait SimilarityIndex {
    /// Nearest `top_k` vectors, closest first. Fails with `IndexNotFound` when
    /// nothing was ever indexed under `index_name`.
    fn query(
        &self,
        index_name: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub filter: FilterNode,
    pub position: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryPage {
    pub ids: Vec<String>,
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

pub trait QueryEvaluator {
    /// Run a structured query. Refusals come back as errors whose
    /// [`kind`](crate::Error::kind) is the evaluator's taxonomy code.
    fn evaluate(&self, account_id: &str, request: &QueryRequest) -> Result<QueryPage>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexAction {
    Index,
    Delete,
}

/// Body of an indexing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMessage {
    pub account_id: String,
    pub email_id: String,
    pub action: IndexAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

pub trait IndexQueue {
    /// Fire-and-forget; returns the queue's acknowledgement id.
    fn enqueue(&self, message: &IndexMessage) -> Result<String>;
}
