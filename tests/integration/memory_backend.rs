//! The in-process backend against the checked-in mailbox fixture.

use mailsift::email::index_name;
use mailsift::error::kind;
use mailsift::filter::FilterNode;
use mailsift::keys::{prefix_for, PostingKey, TokenField};
use mailsift::store::{
    scan_all, Embedder, IndexAction, IndexMessage, IndexQueue, KeyValueStore, QueryEvaluator,
    QueryPage, QueryRequest, SimilarityIndex,
};
use mailsift::MemoryBackend;
use serde_json::json;

use crate::common::{backend_with, fixture_path, make_email, DEMO_ACCOUNT, FRESH_ACCOUNT};

fn filter(value: serde_json::Value) -> FilterNode {
    serde_json::from_value(value).unwrap()
}

fn query_at(
    backend: &MemoryBackend,
    value: serde_json::Value,
    position: usize,
    limit: usize,
) -> mailsift::Result<QueryPage> {
    backend.evaluate(
        DEMO_ACCOUNT,
        &QueryRequest {
            filter: filter(value),
            position,
            limit,
        },
    )
}

fn ids(backend: &MemoryBackend, value: serde_json::Value) -> Vec<String> {
    query_at(backend, value, 0, 100).unwrap().ids
}

fn demo() -> MemoryBackend {
    MemoryBackend::from_fixture(&fixture_path()).unwrap()
}

// ============================================================================
// STRUCTURAL QUERIES
// ============================================================================

#[test]
fn test_empty_condition_lists_newest_first() {
    let backend = demo();
    let page = query_at(&backend, json!({}), 0, 100).unwrap();
    assert_eq!(page.ids, ["em-1003", "em-1001", "em-1002", "em-1004"]);
    assert_eq!(page.total, Some(4));
}

#[test]
fn test_from_matches_domain_token() {
    let backend = demo();
    assert_eq!(
        ids(&backend, json!({"from": "northwind.test"})),
        ["em-1003", "em-1001", "em-1002"]
    );
    assert_eq!(ids(&backend, json!({"from": "Dana"})), ["em-1001"]);
    assert_eq!(ids(&backend, json!({"to": "dana"})), ["em-1003", "em-1004"]);
}

#[test]
fn test_mailbox_and_keyword_predicates() {
    let backend = demo();
    // em-1003 lists mb-archive as false, so only its inbox membership counts.
    assert_eq!(
        ids(&backend, json!({"inMailbox": "mb-inbox"})),
        ["em-1003", "em-1001", "em-1002"]
    );
    assert!(ids(&backend, json!({"inMailbox": "mb-archive"})).is_empty());
    assert_eq!(ids(&backend, json!({"hasKeyword": "$flagged"})), ["em-1001"]);
    assert_eq!(
        ids(&backend, json!({"notKeyword": "$seen"})),
        ["em-1003"]
    );
}

#[test]
fn test_attachment_size_and_date_predicates() {
    let backend = demo();
    assert_eq!(
        ids(&backend, json!({"hasAttachment": true})),
        ["em-1001", "em-1004"]
    );
    assert_eq!(ids(&backend, json!({"minSize": 10000})), ["em-1001", "em-1004"]);
    assert_eq!(
        ids(&backend, json!({"after": "2024-03-03T00:00:00Z"})),
        ["em-1003", "em-1001"]
    );
}

#[test]
fn test_and_of_conditions_intersects() {
    let backend = demo();
    let found = ids(
        &backend,
        json!({
            "operator": "AND",
            "conditions": [{"from": "northwind.test"}, {"hasKeyword": "$seen"}]
        }),
    );
    assert_eq!(found, ["em-1001", "em-1002"]);
}

#[test]
fn test_single_child_or_is_accepted() {
    let backend = demo();
    let found = ids(
        &backend,
        json!({"operator": "OR", "conditions": [{"hasKeyword": "$flagged"}]}),
    );
    assert_eq!(found, ["em-1001"]);
}

// ============================================================================
// PAGINATION
// ============================================================================

#[test]
fn test_position_and_limit() {
    let backend = demo();
    let page = query_at(&backend, json!({}), 1, 2).unwrap();
    assert_eq!(page.ids, ["em-1001", "em-1002"]);
    assert_eq!(page.position, 1);
    assert_eq!(page.total, Some(4));

    let past_end = query_at(&backend, json!({}), 10, 2).unwrap();
    assert!(past_end.ids.is_empty());
}

#[test]
fn test_limit_is_capped() {
    let emails: Vec<_> = (0..150)
        .map(|i| {
            make_email(
                &format!("e{:03}", i),
                "Bulk",
                "bulk@example.com",
                &format!("2024-01-01T00:{:02}:{:02}Z", i / 60, i % 60),
            )
        })
        .collect();
    let backend = backend_with(&emails, false);
    let page = backend
        .evaluate(
            mailsift::testing::TEST_ACCOUNT,
            &QueryRequest {
                filter: filter(json!({})),
                position: 0,
                limit: 500,
            },
        )
        .unwrap();
    assert_eq!(page.ids.len(), 100);
    assert_eq!(page.total, Some(150));
    assert_eq!(page.ids[0], "e149");
}

// ============================================================================
// TEXT QUERIES
// ============================================================================

#[test]
fn test_text_query_finds_seed_without_total() {
    let backend = demo();
    let page = query_at(&backend, json!({"text": "quarterly budget"}), 0, 10).unwrap();
    assert!(page.ids.contains(&"em-1001".to_string()));
    assert_eq!(page.total, None);
}

#[test]
fn test_subject_query_respects_structural_predicates() {
    let backend = demo();
    let found = ids(
        &backend,
        json!({
            "operator": "AND",
            "conditions": [{"subject": "budget"}, {"from": "dana"}]
        }),
    );
    assert_eq!(found, ["em-1001"]);
}

#[test]
fn test_subject_query_with_partial_sender() {
    let backend = demo();
    let found = ids(
        &backend,
        json!({
            "operator": "AND",
            "conditions": [{"subject": "budget"}, {"from": "dan"}]
        }),
    );
    assert_eq!(found, ["em-1001"]);
}

#[test]
fn test_similarity_index_per_account() {
    let backend = demo();
    let vector = backend.embed("Your invoice is ready").unwrap();
    let matches = backend
        .query(&index_name(DEMO_ACCOUNT), &vector, 1, None)
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].key, "em-1004#0");
    assert!(matches[0].distance.abs() < 1e-6);

    // acct-fresh was never indexed.
    let err = backend
        .query(&index_name(FRESH_ACCOUNT), &vector, 1, None)
        .unwrap_err();
    assert_eq!(err.kind(), kind::INDEX_NOT_FOUND);
}

// ============================================================================
// REFUSALS
// ============================================================================

#[test]
fn test_refusals_carry_evaluator_kinds() {
    let backend = demo();
    let cases = [
        (json!({"operator": "NOT", "conditions": [{"from": "dana"}]}), kind::UNSUPPORTED_FILTER),
        (
            json!({"operator": "OR", "conditions": [{"from": "dana"}, {"from": "ravi"}]}),
            kind::UNSUPPORTED_FILTER,
        ),
        (json!({"header": "X-Spam"}), kind::UNSUPPORTED_FILTER),
        (json!({"minSize": "big"}), kind::INVALID_ARGUMENTS),
        (json!({"from": ""}), kind::INVALID_ARGUMENTS),
    ];
    for (value, expected) in cases {
        let err = query_at(&backend, value.clone(), 0, 10).unwrap_err();
        assert_eq!(err.kind(), expected, "{}", value);
    }
}

#[test]
fn test_empty_or_returns_nothing() {
    let backend = demo();
    let page = query_at(&backend, json!({"operator": "OR", "conditions": []}), 0, 10).unwrap();
    assert!(page.ids.is_empty());
    assert_eq!(page.total, Some(0));
}

// ============================================================================
// SCANS AND INDEXING
// ============================================================================

#[test]
fn test_paged_scan_matches_full_scan() {
    let backend = demo().with_page_size(2);
    let pk = "ACCOUNT#acct-demo";
    let prefix = prefix_for(Some(TokenField::From), None);

    let first = backend.scan_prefix(pk, &prefix, None).unwrap();
    assert_eq!(first.items.len(), 2);
    assert!(first.continuation.is_some());

    let all = scan_all(&backend, pk, &prefix).unwrap();
    assert!(all.len() > 2);
    let keys: Vec<&str> = all.iter().map(|item| item.sk.as_str()).collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted);
    for item in &all {
        assert_eq!(PostingKey::decode(&item.sk).unwrap().field(), TokenField::From);
    }
}

#[test]
fn test_email_prefix_lists_account() {
    let backend = demo();
    let emails = scan_all(&backend, "ACCOUNT#acct-demo", "EMAIL#").unwrap();
    assert_eq!(emails.len(), 4);
    assert!(emails
        .iter()
        .all(|item| item.attributes["searchChunks"].as_u64().unwrap() > 0));
}

#[test]
fn test_delete_removes_postings_and_vectors() {
    let backend = demo();
    assert_eq!(ids(&backend, json!({"from": "ravi"})), ["em-1002"]);

    backend
        .enqueue(&IndexMessage {
            account_id: DEMO_ACCOUNT.to_string(),
            email_id: "em-1002".to_string(),
            action: IndexAction::Delete,
            api_url: None,
        })
        .unwrap();

    assert!(ids(&backend, json!({"from": "ravi"})).is_empty());
    let record = backend
        .get("ACCOUNT#acct-demo", "EMAIL#em-1002")
        .unwrap()
        .unwrap();
    assert_eq!(record["searchChunks"], 0);

    let vector = backend.embed("Team offsite logistics").unwrap();
    let matches = backend
        .query(&index_name(DEMO_ACCOUNT), &vector, 50, None)
        .unwrap();
    assert!(matches.iter().all(|m| m.metadata["emailId"] != "em-1002"));
}
