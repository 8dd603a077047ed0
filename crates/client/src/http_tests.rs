// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{classify, Outcome};

#[test]
fn success_with_json_payload() {
    let outcome = classify(200, br#"{"products":[]}"#);
    match outcome {
        Outcome::Ok(value) => assert_eq!(value, serde_json::json!({ "products": [] })),
        other => panic!("expected Ok, got {other:?}"),
    }
}

#[test]
fn success_with_empty_body_is_null() {
    match classify(204, b"") {
        Outcome::Ok(value) => assert!(value.is_null()),
        other => panic!("expected Ok(null), got {other:?}"),
    }
}

#[test]
fn expired_401_with_top_level_code() {
    let outcome = classify(401, br#"{"code":"TOKEN_EXPIRED","message":"expired"}"#);
    match outcome {
        Outcome::AuthExpired(body) => {
            assert_eq!(body.code, "TOKEN_EXPIRED");
            assert_eq!(body.message, "expired");
        }
        other => panic!("expected AuthExpired, got {other:?}"),
    }
}

#[test]
fn expired_401_with_enveloped_error_body() {
    let outcome = classify(401, br#"{"error":{"code":"TOKEN_EXPIRED","message":"expired"}}"#);
    assert!(matches!(outcome, Outcome::AuthExpired(_)));
}

#[test]
fn other_401_is_rejected_not_expired() {
    let outcome = classify(401, br#"{"code":"INVALID_CREDENTIALS","message":"nope"}"#);
    match outcome {
        Outcome::AuthRejected(body) => assert_eq!(body.code, "INVALID_CREDENTIALS"),
        other => panic!("expected AuthRejected, got {other:?}"),
    }
}

#[test]
fn bare_401_is_rejected() {
    assert!(matches!(classify(401, b""), Outcome::AuthRejected(_)));
}

#[test]
fn non_auth_error_keeps_status_and_body() {
    let outcome = classify(503, br#"{"code":"MAINTENANCE","message":"down"}"#);
    match outcome {
        Outcome::HttpError { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body.code, "MAINTENANCE");
        }
        other => panic!("expected HttpError, got {other:?}"),
    }
}

#[test]
fn non_json_error_body_falls_back_to_raw_text() {
    match classify(500, b"Internal Server Error") {
        Outcome::HttpError { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body.message, "Internal Server Error");
        }
        other => panic!("expected HttpError, got {other:?}"),
    }
}

#[test]
fn invalid_json_on_success_is_a_transport_error() {
    assert!(matches!(classify(200, b"<html>"), Outcome::Transport(_)));
}
