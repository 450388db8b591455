//! Property tests for the filter algebra.
//!
//! Verifies:
//! 1. `normalize` is idempotent and removes every single-child OR
//! 2. `classify` rejects exactly the trees the reference oracle rejects
//! 3. `describe` is stable under normalization
//! 4. The JMAP wire form round-trips through serde
//! 5. `flatten` agrees with `classify`

use mailsift::filter::{
    classify, describe, flatten, normalize, Classification, Condition, FilterNode, Operator,
};
use proptest::prelude::*;

use crate::common::{has_single_child_or, oracle_normalize, oracle_rejects};

// ============================================================================
// STRATEGIES
// ============================================================================

fn condition_strategy() -> impl Strategy<Value = FilterNode> {
    let predicate = prop::sample::select(vec![
        "from",
        "to",
        "text",
        "subject",
        "inMailbox",
        "hasKeyword",
    ]);
    let value = prop::string::string_regex("[a-z]{1,6}(@example\\.com)?").unwrap();
    (predicate, value).prop_map(|(p, v)| FilterNode::condition(p, v))
}

fn operator_strategy() -> impl Strategy<Value = Operator> {
    prop_oneof![
        3 => Just(Operator::And),
        3 => Just(Operator::Or),
        1 => Just(Operator::Not),
    ]
}

/// Trees up to depth 4 with 0 to 3 children per operator.
fn tree_strategy() -> impl Strategy<Value = FilterNode> {
    condition_strategy().prop_recursive(4, 32, 3, |inner| {
        (operator_strategy(), prop::collection::vec(inner, 0..4))
            .prop_map(|(op, children)| FilterNode::Operator { op, children })
    })
}

/// Trees built only from conditions, AND, and single-child OR.
fn accepted_tree_strategy() -> impl Strategy<Value = FilterNode> {
    condition_strategy().prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(FilterNode::and),
            inner.prop_map(|child| FilterNode::or(vec![child])),
        ]
    })
}

// ============================================================================
// NORMALIZATION
// ============================================================================

proptest! {
    #[test]
    fn prop_normalize_is_idempotent(tree in tree_strategy()) {
        let once = normalize(&tree);
        prop_assert_eq!(normalize(&once), once.clone());
        prop_assert!(!has_single_child_or(&once));
    }

    #[test]
    fn prop_normalize_matches_reference(tree in tree_strategy()) {
        prop_assert_eq!(normalize(&tree), oracle_normalize(&tree));
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

proptest! {
    #[test]
    fn prop_classify_matches_oracle(tree in tree_strategy()) {
        let rejected = !classify(&tree).is_accepted();
        prop_assert_eq!(rejected, oracle_rejects(&tree));
    }

    #[test]
    fn prop_classify_invariant_under_normalization(tree in tree_strategy()) {
        prop_assert_eq!(classify(&tree), classify(&normalize(&tree)));
    }

    #[test]
    fn prop_accepted_shapes_are_accepted(tree in accepted_tree_strategy()) {
        prop_assert_eq!(classify(&tree), Classification::Accepted);
    }

    #[test]
    fn prop_not_anywhere_is_rejected(tree in accepted_tree_strategy(), cond in condition_strategy()) {
        let poisoned = FilterNode::and(vec![tree, FilterNode::not(vec![cond])]);
        prop_assert!(!classify(&poisoned).is_accepted());
    }

    #[test]
    fn prop_rejection_kind_is_unsupported_filter(tree in tree_strategy()) {
        if let Classification::Rejected(rejection) = classify(&tree) {
            prop_assert_eq!(rejection.kind(), "unsupportedFilter");
        }
    }
}

// ============================================================================
// RENDERING AND WIRE FORMAT
// ============================================================================

proptest! {
    #[test]
    fn prop_describe_stable_under_normalization(tree in tree_strategy()) {
        prop_assert_eq!(describe(&tree), describe(&normalize(&tree)));
    }

    #[test]
    fn prop_describe_distinguishes_normal_forms(a in tree_strategy(), b in tree_strategy()) {
        let (na, nb) = (normalize(&a), normalize(&b));
        prop_assert_eq!(describe(&a) == describe(&b), na == nb);
    }

    #[test]
    fn prop_wire_roundtrip(tree in tree_strategy()) {
        let json = serde_json::to_string(&tree).unwrap();
        let back: FilterNode = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, tree);
    }
}

// ============================================================================
// FLATTEN
// ============================================================================

proptest! {
    #[test]
    fn prop_flatten_refuses_what_classify_rejects(tree in tree_strategy()) {
        if !classify(&tree).is_accepted() {
            prop_assert!(flatten(&tree).is_err());
        }
    }

    #[test]
    fn prop_flatten_keeps_every_predicate(tree in accepted_tree_strategy()) {
        // Conflicts are possible; when flatten succeeds, nothing is lost.
        if let Ok(Some(flat)) = flatten(&tree) {
            let mut expected = Condition::new();
            collect(&tree, &mut expected);
            for predicate in expected.predicates() {
                prop_assert!(flat.get(predicate).is_some());
            }
        }
    }
}

fn collect(tree: &FilterNode, into: &mut Condition) {
    match tree {
        FilterNode::Condition(c) => {
            for (k, v) in c.iter() {
                into.insert(k.clone(), v.clone());
            }
        }
        FilterNode::Operator { children, .. } => {
            for child in children {
                collect(child, into);
            }
        }
    }
}
