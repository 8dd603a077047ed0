// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide session signals and auth wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::token::TokenPair;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    RefreshFailed,
    NoRefreshToken,
    UserLogout,
}

impl SessionEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RefreshFailed => "refresh_failed",
            Self::NoRefreshToken => "no_refresh_token",
            Self::UserLogout => "user_logout",
        }
    }
}

/// Cross-component signals emitted by the auth pipeline.
///
/// Observed by collaborators outside this subsystem (e.g. a redirect to the
/// login surface on `Ended`). This is the only side channel the pipeline
/// exposes.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Login succeeded; carries the freshly stored pair.
    Started { tokens: TokenPair },
    /// Session is over; tokens have been cleared.
    Ended { reason: SessionEndReason },
}

/// Token object as the auth endpoints return it.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTokens {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,
}

impl From<AuthTokens> for TokenPair {
    fn from(tokens: AuthTokens) -> Self {
        Self { access_token: tokens.access_token, refresh_token: tokens.refresh_token }
    }
}

/// `POST /auth/login` response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    pub tokens: Option<AuthTokens>,
    #[serde(default)]
    pub user: Value,
}

/// A successfully established session.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub tokens: TokenPair,
    pub user: Value,
}

/// `POST /auth/refresh-token` response.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub success: bool,
    pub tokens: Option<AuthTokens>,
}
