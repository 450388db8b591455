// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! In-process backend implementing every store contract.
//!
//! # Layout
//!
//! ```text
//! items    ACCOUNT#<id> → { EMAIL#<emailId> → record,
//!                           TOK#<FIELD>#<token>#RCVD#<ts>#<emailId> → posting }
//! vectors  acct-<id>    → [ (key, embedding, metadata) ]
//! pending  FIFO of IndexMessage
//! ```
//!
//! Indexing is asynchronous in the same way a queue-fed worker is: `enqueue`
//! only records the message, and pending messages are applied the next time
//! anything observes the store. A backend built with
//! [`MemoryBackend::with_stalled_indexer`] accepts messages and never applies
//! them, which is how the harness's readiness timeout is exercised.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::Bound;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error, info};

use super::query::Predicates;
use super::{
    scan_all, Embedder, IndexAction, IndexMessage, IndexQueue, Item, KeyValueStore,
    MetadataFilter, Page, QueryEvaluator, QueryPage, QueryRequest, SimilarityIndex, StoredItem,
    VectorMatch, MAX_QUERY_LIMIT,
};
use crate::email::{account_pk, email_sk, index_name, EmailRecord, CHUNK_WORDS, EMAIL_PREFIX};
use crate::error::{kind::INVALID_ARGUMENTS, Error, Result};
use crate::filter::flatten;
use crate::keys::{self, posting_keys, prefix_for, tokenize_addresses, tokenize_text, PostingKey};

pub const DEFAULT_DIMENSIONS: usize = 64;
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Floor on the candidate count pulled from the vector index for a text query.
const MIN_TEXT_CANDIDATES: usize = 50;

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone)]
struct VectorRecord {
    key: String,
    vector: Vec<f32>,
    metadata: Item,
}

#[derive(Debug, Default)]
struct State {
    items: BTreeMap<String, BTreeMap<String, Item>>,
    vectors: BTreeMap<String, Vec<VectorRecord>>,
    pending: VecDeque<IndexMessage>,
    acks: u64,
}

#[derive(Debug)]
pub struct MemoryBackend {
    state: RwLock<State>,
    page_size: usize,
    dimensions: usize,
    stalled: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            page_size: DEFAULT_PAGE_SIZE,
            dimensions: DEFAULT_DIMENSIONS,
            stalled: false,
        }
    }

    /// Backend whose queue accepts messages but never processes them.
    pub fn with_stalled_indexer() -> Self {
        Self {
            stalled: true,
            ..Self::new()
        }
    }

    /// Maximum items per scan page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions.max(1);
        self
    }

    /// Store an email row as-is. Postings and vectors are only written by the
    /// indexer.
    pub fn put_email(&self, account_id: &str, record: &EmailRecord) -> Result<()> {
        let item = record.to_item()?;
        self.put_item(&account_pk(account_id), &email_sk(&record.email_id), item);
        Ok(())
    }

    pub fn put_item(&self, pk: &str, sk: &str, item: Item) {
        self.state
            .write()
            .items
            .entry(pk.to_string())
            .or_default()
            .insert(sk.to_string(), item);
    }

    /// Messages waiting for the indexer.
    pub fn pending(&self) -> usize {
        self.state.read().pending.len()
    }

    /// Apply every pending message now. Returns how many were applied.
    pub fn process_pending(&self) -> usize {
        if self.stalled {
            return 0;
        }
        let mut state = self.state.write();
        let mut applied = 0;
        while let Some(message) = state.pending.pop_front() {
            match apply(&mut state, &message, self.dimensions) {
                Ok(chunks) => {
                    applied += 1;
                    debug!(
                        account = %message.account_id,
                        email = %message.email_id,
                        action = ?message.action,
                        chunks,
                        "applied index message"
                    );
                }
                // A failed message is dropped, like a worker that logs and acks.
                Err(e) => error!(
                    account = %message.account_id,
                    email = %message.email_id,
                    error = %e,
                    "index message failed"
                ),
            }
        }
        applied
    }

    fn load_email(&self, pk: &str, email_id: &str) -> Result<Option<EmailRecord>> {
        let state = self.state.read();
        match state.items.get(pk).and_then(|p| p.get(&email_sk(email_id))) {
            Some(item) => EmailRecord::from_item(item).map(Some),
            None => Ok(None),
        }
    }

    fn vector_candidates(
        &self,
        account_id: &str,
        predicates: &Predicates,
        position: usize,
        limit: usize,
    ) -> Result<Vec<EmailRecord>> {
        let Some((text, kind)) = predicates.search_text() else {
            return Ok(Vec::new());
        };
        let vector = self.embed(text)?;
        let top_k = MIN_TEXT_CANDIDATES.max(3 * (position + limit));
        let filter = predicates.metadata_filter(kind);
        let matches = self.query(&index_name(account_id), &vector, top_k, Some(&filter))?;

        let pk = account_pk(account_id);
        let mut seen = BTreeSet::new();
        let mut records = Vec::new();
        for m in matches {
            let Some(email_id) = m.metadata.get("emailId").and_then(Value::as_str) else {
                continue;
            };
            if !seen.insert(email_id.to_string()) {
                continue;
            }
            if let Some(record) = self.load_email(&pk, email_id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn structural_candidates(
        &self,
        account_id: &str,
        predicates: &Predicates,
    ) -> Result<Vec<EmailRecord>> {
        let pk = account_pk(account_id);
        if predicates.addresses.is_empty() {
            return scan_all(self, &pk, EMAIL_PREFIX)?
                .iter()
                .map(|item| EmailRecord::from_item(&item.attributes))
                .collect();
        }

        // Intersect posting scans, one per address predicate.
        let mut ids: Option<BTreeSet<String>> = None;
        for (field, token) in &predicates.addresses {
            let prefix = prefix_for(Some(*field), Some(token.as_str()));
            let mut found = BTreeSet::new();
            for item in scan_all(self, &pk, &prefix)? {
                let key = PostingKey::decode(&item.sk)?;
                found.insert(key.document_id().to_string());
            }
            ids = Some(match ids {
                None => found,
                Some(acc) => acc.intersection(&found).cloned().collect(),
            });
        }

        let mut records = Vec::new();
        for id in ids.unwrap_or_default() {
            if let Some(record) = self.load_email(&pk, &id)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

// =============================================================================
// INDEXER
// =============================================================================

/// Sort keys of every posting in `partition` that points at `email_id`.
fn stored_postings(partition: &BTreeMap<String, Item>, email_id: &str) -> Vec<String> {
    partition
        .range::<str, _>((Bound::Included(keys::TOKEN_PREFIX), Bound::Unbounded))
        .map(|(sk, _)| sk)
        .take_while(|sk| sk.starts_with(keys::TOKEN_PREFIX))
        .filter(|sk| PostingKey::decode(sk).is_ok_and(|key| key.document_id() == email_id))
        .cloned()
        .collect()
}

fn apply(state: &mut State, message: &IndexMessage, dimensions: usize) -> Result<usize> {
    let pk = account_pk(&message.account_id);
    let sk = email_sk(&message.email_id);
    let item = state
        .items
        .get(&pk)
        .and_then(|p| p.get(&sk))
        .ok_or_else(|| {
            Error::InvalidRecord(format!(
                "email '{}' not found in account '{}'",
                message.email_id, message.account_id
            ))
        })?;
    let mut record = EmailRecord::from_item(item)?;

    // Clear whatever a previous run wrote for this id, even if the record has
    // changed since, so re-indexing is idempotent.
    let index = index_name(&message.account_id);
    if let Some(partition) = state.items.get_mut(&pk) {
        let stale = stored_postings(partition, &record.email_id);
        for sk in &stale {
            partition.remove(sk);
        }
    }
    if let Some(vectors) = state.vectors.get_mut(&index) {
        vectors.retain(|v| {
            v.metadata.get("emailId").and_then(Value::as_str) != Some(record.email_id.as_str())
        });
    }

    let written = match message.action {
        IndexAction::Index => {
            let postings = posting_keys(&record)?;
            let chunks = record.chunks(CHUNK_WORDS);
            let base = vector_metadata(&record);

            let partition = state.items.entry(pk.clone()).or_default();
            for key in &postings {
                partition.insert(key.encode(), posting_item(key));
            }

            let vectors = state.vectors.entry(index).or_default();
            for chunk in &chunks {
                let mut metadata = base.clone();
                metadata.insert("chunkIndex".into(), Value::from(chunk.index));
                metadata.insert("type".into(), Value::from(chunk.kind.as_str()));
                vectors.push(VectorRecord {
                    key: format!("{}#{}", record.email_id, chunk.index),
                    vector: embed_text(dimensions, &chunk.text),
                    metadata,
                });
            }
            chunks.len()
        }
        IndexAction::Delete => 0,
    };

    record.search_chunks = u32::try_from(written).unwrap_or(u32::MAX);
    state
        .items
        .entry(pk)
        .or_default()
        .insert(sk, record.to_item()?);
    Ok(written)
}

fn posting_item(key: &PostingKey) -> Item {
    let mut item = Item::new();
    item.insert("field".into(), Value::from(key.field().as_str()));
    item.insert("token".into(), Value::from(key.token()));
    item.insert("receivedAt".into(), Value::from(key.received_at()));
    item.insert("emailId".into(), Value::from(key.document_id()));
    item
}

fn vector_metadata(record: &EmailRecord) -> Item {
    let mut meta = Item::new();
    meta.insert("emailId".into(), Value::from(record.email_id.as_str()));
    meta.insert("subject".into(), Value::from(record.subject.as_str()));
    meta.insert(
        "from".into(),
        Value::from(
            record
                .first_sender()
                .map(ToString::to_string)
                .unwrap_or_default(),
        ),
    );
    meta.insert("receivedAt".into(), Value::from(record.received_at.as_str()));
    meta.insert("mailboxIds".into(), Value::from(record.mailbox_list()));
    meta.insert("keywords".into(), Value::from(record.keyword_list()));
    meta.insert("hasAttachment".into(), Value::from(record.has_attachment));
    meta.insert("size".into(), Value::from(record.size));
    for (field, addrs) in [
        (keys::TokenField::From, &record.from),
        (keys::TokenField::To, &record.to),
        (keys::TokenField::Cc, &record.cc),
        (keys::TokenField::Bcc, &record.bcc),
    ] {
        meta.insert(
            field.metadata_attribute().into(),
            Value::from(tokenize_addresses(addrs)),
        );
    }
    meta
}

// =============================================================================
// EMBEDDING
// =============================================================================

/// Hashed bag-of-words, L2-normalized. The zero vector stands for text with no
/// words.
pub fn embed_text(dimensions: usize, text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimensions];
    for token in tokenize_text(text) {
        let bucket = crc32fast::hash(token.as_bytes()) as usize % dimensions;
        vector[bucket] += 1.0;
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

/// Cosine distance in `[0, 2]`; zero vectors are at distance 1 from everything.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot / (na * nb)
}

fn metadata_matches(metadata: &Item, filter: &MetadataFilter) -> bool {
    filter.iter().all(|(attr, wanted)| match metadata.get(attr) {
        Some(Value::Array(values)) => values.contains(wanted),
        Some(value) => value == wanted,
        None => false,
    })
}

// =============================================================================
// CONTRACTS
// =============================================================================

impl KeyValueStore for MemoryBackend {
    fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>> {
        self.process_pending();
        let state = self.state.read();
        Ok(state.items.get(pk).and_then(|p| p.get(sk)).cloned())
    }

    fn scan_prefix(
        &self,
        pk: &str,
        sk_prefix: &str,
        continuation: Option<&str>,
    ) -> Result<Page<StoredItem>> {
        self.process_pending();
        let state = self.state.read();
        let Some(partition) = state.items.get(pk) else {
            return Ok(Page {
                items: Vec::new(),
                continuation: None,
            });
        };

        let start = match continuation {
            Some(after) => Bound::Excluded(after),
            None => Bound::Included(sk_prefix),
        };
        let mut matching = partition
            .range::<str, _>((start, Bound::Unbounded))
            .take_while(|(sk, _)| sk.starts_with(sk_prefix));

        let items: Vec<StoredItem> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(sk, attributes)| StoredItem {
                pk: pk.to_string(),
                sk: sk.clone(),
                attributes: attributes.clone(),
            })
            .collect();
        let continuation = match matching.next() {
            Some(_) => items.last().map(|item| item.sk.clone()),
            None => None,
        };
        Ok(Page {
            items,
            continuation,
        })
    }
}

impl Embedder for MemoryBackend {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(embed_text(self.dimensions, text))
    }
}

impl SimilarityIndex for MemoryBackend {
    fn query(
        &self,
        index_name: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>> {
        self.process_pending();
        if vector.len() != self.dimensions {
            return Err(Error::evaluator(
                INVALID_ARGUMENTS,
                format!(
                    "query vector has {} dimensions, index expects {}",
                    vector.len(),
                    self.dimensions
                ),
            ));
        }
        let state = self.state.read();
        let records = state
            .vectors
            .get(index_name)
            .ok_or_else(|| Error::IndexNotFound(index_name.to_string()))?;

        let mut matches: Vec<VectorMatch> = records
            .iter()
            .filter(|r| filter.map_or(true, |f| metadata_matches(&r.metadata, f)))
            .map(|r| VectorMatch {
                key: r.key.clone(),
                distance: cosine_distance(vector, &r.vector),
                metadata: r.metadata.clone(),
            })
            .collect();
        matches.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.key.cmp(&b.key))
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}

impl QueryEvaluator for MemoryBackend {
    /// Text queries go through the similarity index and report no total.
    /// Everything else intersects posting scans.
    ///
    /// An `OR` with no children matches nothing and yields an empty page with
    /// `total: Some(0)`. Evaluators that require exactly one `OR` child reject
    /// it as `unsupportedFilter` instead, so conformance scenarios never send one.
    fn evaluate(&self, account_id: &str, request: &QueryRequest) -> Result<QueryPage> {
        let limit = request.limit.min(MAX_QUERY_LIMIT);
        let Some(condition) = flatten(&request.filter)? else {
            return Ok(QueryPage {
                ids: Vec::new(),
                position: request.position,
                total: Some(0),
            });
        };
        let predicates = Predicates::parse(&condition)?;

        let text_path = predicates.search_text().is_some();
        let mut candidates = if text_path {
            self.vector_candidates(account_id, &predicates, request.position, limit)?
        } else {
            self.structural_candidates(account_id, &predicates)?
        };
        candidates.retain(|record| predicates.matches(record));
        candidates.sort_by(|a, b| {
            b.received_at
                .cmp(&a.received_at)
                .then_with(|| a.email_id.cmp(&b.email_id))
        });

        let total = candidates.len();
        let ids: Vec<String> = candidates
            .into_iter()
            .skip(request.position)
            .take(limit)
            .map(|record| record.email_id)
            .collect();
        debug!(
            account = %account_id,
            filter = %request.filter,
            returned = ids.len(),
            text_path,
            "evaluated query"
        );
        Ok(QueryPage {
            ids,
            position: request.position,
            // Vector search only sees the top candidates, so its count is not exact.
            total: (!text_path).then_some(total),
        })
    }
}

impl IndexQueue for MemoryBackend {
    fn enqueue(&self, message: &IndexMessage) -> Result<String> {
        let mut state = self.state.write();
        state.acks += 1;
        let ack = format!("msg-{:06}", state.acks);
        state.pending.push_back(message.clone());
        info!(
            account = %message.account_id,
            email = %message.email_id,
            action = ?message.action,
            ack = %ack,
            "enqueued index message"
        );
        Ok(ack)
    }
}
