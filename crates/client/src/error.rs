// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error body with machine-readable code and human-readable message.
///
/// This is the JSON shape the admin API attaches to non-2xx responses:
/// `{"code":"TOKEN_EXPIRED","message":"..."}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

/// 401 body code that triggers the refresh protocol. Any other 401 is terminal.
pub const TOKEN_EXPIRED_CODE: &str = "TOKEN_EXPIRED";

/// Errors surfaced by the request pipeline.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// Network failure before a response was received.
    Transport(String),
    /// Non-2xx, non-auth response.
    Http { status: u16, body: ErrorBody },
    /// 401 with `code == "TOKEN_EXPIRED"`; recoverable via refresh.
    AuthExpired(ErrorBody),
    /// Any other 401, or an expiry with no usable refresh token. Terminal.
    AuthRejected(ErrorBody),
    /// The refresh call itself failed. Terminal; ends the session.
    RefreshFailed(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(cause) => write!(f, "transport error: {cause}"),
            Self::Http { status, body } => {
                write!(f, "http {status}: {} {}", body.code, body.message)
            }
            Self::AuthExpired(body) => write!(f, "auth expired: {}", body.message),
            Self::AuthRejected(body) => {
                write!(f, "auth rejected: {} {}", body.code, body.message)
            }
            Self::RefreshFailed(msg) => write!(f, "token refresh failed: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}
