// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One HTTP exchange: build headers, serialize the body, classify the result.
//!
//! The [`Outcome`] classification is the contract the refresh coordinator
//! depends on — refresh is triggered only by [`Outcome::AuthExpired`], i.e. a
//! 401 whose body carries `code: "TOKEN_EXPIRED"`.

use std::time::Duration;

use serde_json::Value;

use crate::error::{ErrorBody, TOKEN_EXPIRED_CODE};

/// A request ready to execute (and re-execute after a token refresh).
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub body: Option<Value>,
}

/// Classified result of a single exchange.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// 2xx with a JSON payload (empty body becomes `Value::Null`).
    Ok(Value),
    /// 401 with the machine-readable token-expired code.
    AuthExpired(ErrorBody),
    /// Any other 401.
    AuthRejected(ErrorBody),
    /// Other non-2xx.
    HttpError { status: u16, body: ErrorBody },
    /// Network failure before a response was received.
    Transport(String),
}

/// Performs single HTTP exchanges against the admin API.
pub struct RequestExecutor {
    base_url: String,
    http: reqwest::Client,
}

impl RequestExecutor {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
            tracing::warn!(err = %e, "http client init failed, using defaults without a timeout");
            reqwest::Client::new()
        });
        Self { base_url, http }
    }

    /// The shared reqwest client (also used for the refresh call).
    pub fn client(&self) -> &reqwest::Client {
        &self.http
    }

    /// Absolute URL for an API endpoint path.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Execute one exchange with an optional bearer token.
    pub async fn execute(&self, req: &PreparedRequest, token: Option<&str>) -> Outcome {
        let mut builder = self.http.request(req.method.clone(), &req.url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = req.body {
            builder = builder.json(body);
        }

        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(e) => return Outcome::Transport(e.to_string()),
        };

        let status = resp.status().as_u16();
        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Outcome::Transport(e.to_string()),
        };
        classify(status, &bytes)
    }
}

/// Classify a status + body into an [`Outcome`].
pub fn classify(status: u16, bytes: &[u8]) -> Outcome {
    if (200..300).contains(&status) {
        if bytes.is_empty() {
            return Outcome::Ok(Value::Null);
        }
        return match serde_json::from_slice(bytes) {
            Ok(value) => Outcome::Ok(value),
            Err(e) => Outcome::Transport(format!("invalid json payload: {e}")),
        };
    }

    let body = parse_error_body(bytes);
    if status == 401 {
        if body.code == TOKEN_EXPIRED_CODE {
            return Outcome::AuthExpired(body);
        }
        return Outcome::AuthRejected(body);
    }
    Outcome::HttpError { status, body }
}

/// Parse an error body from either `{code,message}` or the enveloped
/// `{"error":{code,message}}` shape. Falls back to the raw text as message.
fn parse_error_body(bytes: &[u8]) -> ErrorBody {
    if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
        let inner = value.get("error").unwrap_or(&value);
        if let Ok(body) = serde_json::from_value::<ErrorBody>(inner.clone()) {
            if !body.code.is_empty() || !body.message.is_empty() {
                return body;
            }
        }
        // Some endpoints put the code at the top level next to other fields.
        let code = value.get("code").and_then(Value::as_str).unwrap_or_default();
        let message = value.get("message").and_then(Value::as_str).unwrap_or_default();
        if !code.is_empty() || !message.is_empty() {
            return ErrorBody::new(code, message);
        }
    }
    ErrorBody::new("", String::from_utf8_lossy(bytes))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
