//! Property tests for posting-key encoding/decoding.
//!
//! Verifies:
//! 1. Round-trip is lossless for every encodable key
//! 2. Any token carrying the `#RCVD#` marker is refused
//! 3. Encoding is pure
//! 4. Decoding never panics on arbitrary input
//! 5. Prefixes built by `prefix_for` select exactly the matching keys

use mailsift::error::Error;
use mailsift::keys::{decode, encode, prefix_for, PostingKey, TokenField};
use proptest::prelude::*;

// ============================================================================
// STRATEGIES
// ============================================================================

fn field_strategy() -> impl Strategy<Value = TokenField> {
    prop::sample::select(TokenField::ALL.to_vec())
}

/// Lower-case tokens, including `#` and the lower-case look-alike `#rcvd#`.
fn token_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-z0-9@._+-]{1,24}").unwrap(),
        prop::string::string_regex("[a-z0-9#]{1,16}").unwrap(),
        Just("x#rcvd#y".to_string()),
        Just("#".to_string()),
        Just("café".to_string()),
    ]
}

/// Mostly RFC3339, plus `#`-free strings built from marker fragments.
fn timestamp_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => (2000u32..2100, 1u32..13, 1u32..29, 0u32..24, 0u32..60, 0u32..60).prop_map(
            |(y, mo, d, h, mi, s)| format!("{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z", y, mo, d, h, mi, s),
        ),
        1 => prop::string::string_regex("(RCVD|rcvd|TOK|[A-Z0-9:-]){1,4}").unwrap(),
    ]
}

fn doc_id_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => prop::string::string_regex("[A-Za-z0-9_-]{1,20}").unwrap(),
        1 => prop::string::string_regex("(RCVD|[a-z0-9]){1,4}").unwrap(),
    ]
}

// ============================================================================
// ROUND-TRIP
// ============================================================================

proptest! {
    #[test]
    fn prop_roundtrip(
        field in field_strategy(),
        token in token_strategy(),
        ts in timestamp_strategy(),
        doc in doc_id_strategy(),
    ) {
        let key = encode(field, &token, &ts, &doc).unwrap();
        let decoded = decode(&key).unwrap();
        prop_assert_eq!(decoded.field(), field);
        prop_assert_eq!(decoded.token(), token.as_str());
        prop_assert_eq!(decoded.received_at(), ts.as_str());
        prop_assert_eq!(decoded.document_id(), doc.as_str());
        prop_assert_eq!(decoded.encode(), key);
    }

    #[test]
    fn prop_display_and_from_str_agree(
        field in field_strategy(),
        token in token_strategy(),
        ts in timestamp_strategy(),
        doc in doc_id_strategy(),
    ) {
        let key = PostingKey::new(field, &token, &ts, &doc).unwrap();
        let parsed: PostingKey = key.to_string().parse().unwrap();
        prop_assert_eq!(parsed, key);
    }

    #[test]
    fn prop_encode_is_pure(
        field in field_strategy(),
        token in token_strategy(),
        ts in timestamp_strategy(),
        doc in doc_id_strategy(),
    ) {
        prop_assert_eq!(
            encode(field, &token, &ts, &doc).unwrap(),
            encode(field, &token, &ts, &doc).unwrap()
        );
    }
}

// ============================================================================
// REJECTION
// ============================================================================

proptest! {
    #[test]
    fn prop_marker_in_token_is_refused(
        field in field_strategy(),
        before in "[a-z#]{0,8}",
        after in "[a-z#]{0,8}",
        ts in timestamp_strategy(),
        doc in doc_id_strategy(),
    ) {
        let token = format!("{}#RCVD#{}", before, after);
        let is_invalid_token = matches!(
            encode(field, &token, &ts, &doc),
            Err(Error::InvalidToken { .. })
        );
        prop_assert!(is_invalid_token);
    }

    #[test]
    fn prop_hash_in_document_id_is_refused(
        field in field_strategy(),
        ts in timestamp_strategy(),
        left in "[a-z0-9]{0,6}",
        right in "[a-z0-9]{0,6}",
    ) {
        let doc = format!("{}#{}", left, right);
        let is_invalid_part = matches!(
            encode(field, "token", &ts, &doc),
            Err(Error::InvalidKeyPart { .. })
        );
        prop_assert!(is_invalid_part);
    }

    /// Decoding arbitrary text returns a value or an error, never panics.
    #[test]
    fn prop_decode_total(input in ".{0,80}") {
        let _ = decode(&input);
    }

    #[test]
    fn prop_decode_without_prefix_is_malformed(input in "[a-zA-Z0-9#]{0,40}") {
        prop_assume!(!input.starts_with("TOK#"));
        let is_malformed = matches!(decode(&input), Err(Error::MalformedKey { .. }));
        prop_assert!(is_malformed);
    }
}

// ============================================================================
// PREFIXES
// ============================================================================

proptest! {
    #[test]
    fn prop_prefix_selects_field_and_token(
        field in field_strategy(),
        other in field_strategy(),
        token in "[a-z0-9]{1,12}",
        cut in 0usize..12,
        ts in timestamp_strategy(),
        doc in doc_id_strategy(),
    ) {
        let key = encode(field, &token, &ts, &doc).unwrap();
        let token_prefix = &token[..cut.min(token.len())];

        prop_assert!(key.starts_with(&prefix_for(None, None)));
        prop_assert!(key.starts_with(&prefix_for(Some(field), None)));
        prop_assert!(key.starts_with(&prefix_for(Some(field), Some(token_prefix))));
        if other != field {
            prop_assert!(!key.starts_with(&prefix_for(Some(other), None)));
        }
    }
}
