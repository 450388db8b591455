//! Full conformance runs.

use mailsift::error::Error;
use mailsift::harness::{Harness, Outcome, Report, Services};
use mailsift::store::KeyValueStore;
use mailsift::{HarnessConfig, MemoryBackend};

use crate::common::{
    backend_with, fast_config, fixture_backend, make_email, make_seen_email, AcceptAll,
    AlwaysFails, DEMO_ACCOUNT, DEMO_SEED, FRESH_ACCOUNT, FRESH_SEED, TEST_ACCOUNT,
};

fn run(backend: &MemoryBackend, account: &str, email: &str) -> mailsift::Result<Report> {
    Harness::new(Services::from_backend(backend), fast_config()).run(account, email)
}

fn outcome(report: &Report, number: u32) -> &Outcome {
    &report
        .results
        .iter()
        .find(|r| r.number == number)
        .unwrap_or_else(|| panic!("scenario {} missing from report", number))
        .outcome
}

// ============================================================================
// HAPPY PATHS
// ============================================================================

#[test]
fn test_fixture_seed_passes_every_scenario() {
    let backend = fixture_backend();
    let report = run(&backend, DEMO_ACCOUNT, DEMO_SEED).unwrap();

    assert_eq!(report.results.len(), 12);
    let numbers: Vec<u32> = report.results.iter().map(|r| r.number).collect();
    assert_eq!(numbers, (1..=12).collect::<Vec<_>>());
    for result in &report.results {
        assert!(
            matches!(result.outcome, Outcome::Passed(_)),
            "{}",
            result
        );
    }
    assert!(report.is_success());
    assert_eq!(report.summary(), "12 passed, 0 failed, 0 skipped (12 total)");
}

#[test]
fn test_unindexed_seed_is_indexed_then_passes() {
    let backend = fixture_backend();
    let before = backend
        .get("ACCOUNT#acct-fresh", "EMAIL#em-2001")
        .unwrap()
        .unwrap();
    assert_eq!(before["searchChunks"], 0);

    let report = run(&backend, FRESH_ACCOUNT, FRESH_SEED).unwrap();
    assert!(report.is_success(), "{:?}", report);

    let after = backend
        .get("ACCOUNT#acct-fresh", "EMAIL#em-2001")
        .unwrap()
        .unwrap();
    assert!(after["searchChunks"].as_u64().unwrap() > 0);
}

#[test]
fn test_missing_keyword_skips_and_still_succeeds() {
    let backend = fixture_backend();
    let report = run(&backend, FRESH_ACCOUNT, FRESH_SEED).unwrap();

    assert!(matches!(outcome(&report, 5), Outcome::Skipped(_)));
    assert!(matches!(outcome(&report, 6), Outcome::Skipped(_)));
    assert_eq!(report.skipped(), 2);
    assert_eq!(report.failed(), 0);
    assert!(report.is_success());
}

#[test]
fn test_reindex_requested_on_indexed_seed() {
    let backend = fixture_backend();
    let config = HarnessConfig {
        reindex: true,
        ..fast_config()
    };
    let report = Harness::new(Services::from_backend(&backend), config)
        .run(DEMO_ACCOUNT, DEMO_SEED)
        .unwrap();
    assert!(report.is_success());
}

#[test]
fn test_subjectless_seed_runs_only_what_it_can() {
    let mut email = make_email("e1", "", "sam@example.org", "2024-01-01T00:00:00Z");
    email.body = "Short note without a subject".into();
    let backend = backend_with(&[email], true);

    let report = run(&backend, TEST_ACCOUNT, "e1").unwrap();
    for n in [1, 2, 7, 12] {
        assert!(matches!(outcome(&report, n), Outcome::Skipped(_)), "#{}", n);
    }
    for n in [3, 4, 8, 9, 10, 11] {
        assert!(matches!(outcome(&report, n), Outcome::Passed(_)), "#{}", n);
    }
    assert!(report.is_success());
}

#[test]
fn test_marker_in_sender_local_part_is_scanned_lower_case() {
    let email = make_email(
        "e1",
        "Marker sender",
        "X#RCVD#y@example.com",
        "2024-01-01T00:00:00Z",
    );
    let backend = backend_with(&[email], true);

    let report = run(&backend, TEST_ACCOUNT, "e1").unwrap();
    assert!(matches!(outcome(&report, 11), Outcome::Passed(_)));
    assert!(report.is_success(), "{:?}", report);
}

#[cfg(feature = "unicode-normalization")]
#[test]
fn test_decomposed_sender_local_part_is_scanned_composed() {
    let email = make_email(
        "e1",
        "Accented sender",
        "jose\u{0301}@example.com",
        "2024-01-01T00:00:00Z",
    );
    let backend = backend_with(&[email], true);

    let report = run(&backend, TEST_ACCOUNT, "e1").unwrap();
    assert!(matches!(outcome(&report, 11), Outcome::Passed(_)));
    assert!(report.is_success(), "{:?}", report);
}

// ============================================================================
// FATAL PRECONDITIONS
// ============================================================================

#[test]
fn test_missing_seed_is_fatal() {
    let backend = fixture_backend();
    let err = run(&backend, DEMO_ACCOUNT, "em-nope").unwrap_err();
    assert!(matches!(err, Error::SeedNotFound { .. }));
    assert!(err.is_fatal_precondition());
    assert_eq!(err.kind(), "preconditionFailed");
}

#[test]
fn test_stalled_indexer_is_fatal() {
    let backend = MemoryBackend::with_stalled_indexer();
    backend
        .put_email(
            TEST_ACCOUNT,
            &make_email("e1", "Hello", "a@example.com", "2024-01-01T00:00:00Z"),
        )
        .unwrap();

    let err = run(&backend, TEST_ACCOUNT, "e1").unwrap_err();
    match err {
        Error::NeverIndexed { email_id, attempts } => {
            assert_eq!(email_id, "e1");
            assert_eq!(attempts, fast_config().poll_attempts);
        }
        other => panic!("expected NeverIndexed, got {:?}", other),
    }
}

#[test]
fn test_invalid_config_is_refused_before_any_call() {
    let backend = MemoryBackend::new();
    let config = HarnessConfig {
        top_k: 0,
        ..fast_config()
    };
    let err = Harness::new(Services::from_backend(&backend), config)
        .run(TEST_ACCOUNT, "e1")
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

// ============================================================================
// MISBEHAVING SERVICES
// ============================================================================

#[test]
fn test_permissive_evaluator_fails_refusal_scenarios() {
    let backend = fixture_backend();
    let permissive = AcceptAll {
        ids: vec![DEMO_SEED.to_string()],
    };
    let services = Services {
        evaluator: &permissive,
        ..Services::from_backend(&backend)
    };

    let report = Harness::new(services, fast_config())
        .run(DEMO_ACCOUNT, DEMO_SEED)
        .unwrap();
    assert!(outcome(&report, 9).is_failure());
    assert!(outcome(&report, 10).is_failure());
    assert!(matches!(outcome(&report, 2), Outcome::Passed(_)));
    assert_eq!(report.failed(), 2);
    assert!(!report.is_success());
}

#[test]
fn test_wrong_error_kind_is_not_a_refusal() {
    let backend = fixture_backend();
    let broken = AlwaysFails {
        kind: "serverFail",
    };
    let services = Services {
        evaluator: &broken,
        ..Services::from_backend(&backend)
    };

    let report = Harness::new(services, fast_config())
        .run(DEMO_ACCOUNT, DEMO_SEED)
        .unwrap();
    // Every query scenario fails; vector and scan scenarios still pass.
    for n in 2..=10 {
        assert!(outcome(&report, n).is_failure(), "#{}", n);
    }
    for n in [1, 11, 12] {
        assert!(matches!(outcome(&report, n), Outcome::Passed(_)), "#{}", n);
    }
}

#[test]
fn test_case_sensitive_kind_comparison() {
    let backend = fixture_backend();
    let shouty = AlwaysFails {
        kind: "UnsupportedFilter",
    };
    let services = Services {
        evaluator: &shouty,
        ..Services::from_backend(&backend)
    };
    let report = Harness::new(services, fast_config())
        .run(DEMO_ACCOUNT, DEMO_SEED)
        .unwrap();
    assert!(outcome(&report, 9).is_failure());
}

#[test]
fn test_seed_missing_from_results_fails() {
    let backend = backend_with(
        &[
            make_seen_email("e1", "Lunch plans", "kim@example.org", "2024-01-01T00:00:00Z"),
            make_seen_email("e2", "Other", "lee@example.org", "2024-01-02T00:00:00Z"),
        ],
        true,
    );
    let wrong = AcceptAll {
        ids: vec!["e2".to_string()],
    };
    let services = Services {
        evaluator: &wrong,
        ..Services::from_backend(&backend)
    };
    let report = Harness::new(services, fast_config())
        .run(TEST_ACCOUNT, "e1")
        .unwrap();
    match outcome(&report, 4) {
        Outcome::Failed(detail) => assert!(detail.contains("e1")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn test_report_serializes() {
    let backend = fixture_backend();
    let report = run(&backend, FRESH_ACCOUNT, FRESH_SEED).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["accountId"], FRESH_ACCOUNT);
    assert_eq!(json["seedId"], FRESH_SEED);
    assert_eq!(json["results"][4]["outcome"]["status"], "skipped");
}
