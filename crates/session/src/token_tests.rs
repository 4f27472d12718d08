// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;
use serde_json::json;

use super::*;
use crate::test_support::{encode_token, token_expiring_at};

const NOW: i64 = 1_750_000_000;

#[test]
fn decodes_exp_and_iat() -> anyhow::Result<()> {
    let token = encode_token(&json!({ "sub": "42", "exp": NOW + 300, "iat": NOW }));
    let claims = decode_token(Some(&token))?;
    assert_eq!(claims.exp, Some(NOW + 300));
    assert_eq!(claims.iat, Some(NOW));
    assert_eq!(claims.extra.get("sub"), Some(&json!("42")));
    Ok(())
}

#[test]
fn decodes_url_safe_alphabet() -> anyhow::Result<()> {
    // '?' and '>' runs land on base64 indices 62/63 ('+'/'/' vs '-'/'_').
    let token = encode_token(&json!({ "exp": NOW, "note": "??>??>" }));
    assert!(token.contains('-') || token.contains('_'), "fixture should exercise url-safe chars");
    let claims = decode_token(Some(&token))?;
    assert_eq!(claims.extra.get("note"), Some(&json!("??>??>")));
    Ok(())
}

#[test]
fn fractional_exp_is_truncated() -> anyhow::Result<()> {
    let token = encode_token(&json!({ "exp": 1_750_000_000.75 }));
    assert_eq!(decode_token(Some(&token))?.exp, Some(1_750_000_000));
    Ok(())
}

#[yare::parameterized(
    absent = { None, "MISSING_TOKEN" },
    empty = { Some(""), "MISSING_TOKEN" },
    not_a_jwt = { Some("not-a-jwt"), "MISSING_PAYLOAD" },
    empty_payload = { Some("header..sig"), "MISSING_PAYLOAD" },
    bad_base64 = { Some("header.!!!!.sig"), "INVALID_BASE64" },
    not_json = { Some("header.bm90IGpzb24.sig"), "INVALID_JSON" },
    json_array = { Some("header.WzEsMl0.sig"), "INVALID_JSON" },
    string_exp = { Some("header.eyJleHAiOiJzb29uIn0.sig"), "INVALID_JSON" },
)]
fn malformed_tokens_yield_reason(token: Option<&str>, code: &str) {
    let err = decode_token(token).err();
    assert_eq!(err.as_ref().map(DecodeError::as_str), Some(code));
    assert!(claims_or_default(token).is_empty());
}

#[test]
fn absent_token_is_expiring() {
    assert!(is_token_expiring_soon(None, DEFAULT_EXPIRY_BUFFER_SECS, NOW));
    assert!(is_token_expiring_soon(Some(""), DEFAULT_EXPIRY_BUFFER_SECS, NOW));
}

#[test]
fn token_without_exp_is_not_expiring() {
    let token = encode_token(&json!({ "iat": NOW }));
    assert!(!is_token_expiring_soon(Some(&token), DEFAULT_EXPIRY_BUFFER_SECS, NOW));
    assert_eq!(token_expiry_time(Some(&token), NOW), None);
}

#[test]
fn malformed_token_is_not_expiring() {
    assert!(!is_token_expiring_soon(Some("not-a-jwt"), DEFAULT_EXPIRY_BUFFER_SECS, NOW));
    assert_eq!(token_expiry_time(Some("not-a-jwt"), NOW), None);
}

#[test]
fn expiry_time_is_negative_once_expired() {
    let token = token_expiring_at(NOW - 30);
    assert_eq!(token_expiry_time(Some(&token), NOW), Some(-30));
    assert!(is_token_expiring_soon(Some(&token), 0, NOW));
}

#[test]
fn expiry_time_absent_token() {
    assert_eq!(token_expiry_time(None, NOW), None);
}

#[test]
fn buffer_boundary_is_exclusive() {
    let token = token_expiring_at(NOW + 60);
    assert!(!is_token_expiring_soon(Some(&token), 60, NOW));
    assert!(is_token_expiring_soon(Some(&token), 61, NOW));
}

#[yare::parameterized(
    min_integer = { json!(i64::MIN), true, i64::MIN },
    huge_negative_float = { json!(-1e300), true, i64::MIN },
    max_integer = { json!(i64::MAX), false, i64::MAX - NOW },
    huge_positive_float = { json!(1e300), false, i64::MAX - NOW },
)]
fn extreme_exp_saturates(exp: serde_json::Value, expiring: bool, expires_in: i64) {
    let token = encode_token(&json!({ "exp": exp }));
    assert_eq!(is_token_expiring_soon(Some(&token), DEFAULT_EXPIRY_BUFFER_SECS, NOW), expiring);
    assert_eq!(token_expiry_time(Some(&token), NOW), Some(expires_in));
}

proptest! {
    #[test]
    fn expiry_sign_holds_across_full_range(exp in any::<i64>(), now in any::<i64>()) {
        let token = encode_token(&json!({ "exp": exp }));
        prop_assert_eq!(is_token_expiring_soon(Some(&token), 1, now), exp <= now);
        let remaining = token_expiry_time(Some(&token), now);
        prop_assert_eq!(remaining.map(|r| r <= 0), Some(exp <= now));
    }

    #[test]
    fn expiring_soon_iff_remaining_below_buffer(n in -10_000i64..10_000, buffer in 0i64..5_000) {
        let token = token_expiring_at(NOW + n);
        prop_assert_eq!(is_token_expiring_soon(Some(&token), buffer, NOW), n < buffer);
        prop_assert_eq!(token_expiry_time(Some(&token), NOW), Some(n));
    }

    #[test]
    fn decode_never_panics(input in ".{0,64}") {
        let _ = decode_token(Some(&input));
        let _ = is_token_expiring_soon(Some(&input), DEFAULT_EXPIRY_BUFFER_SECS, NOW);
    }
}
