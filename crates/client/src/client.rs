// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated API client: the composed entry point for all admin requests.
//!
//! Collaborators receive one `ApiClient` built at application start and call
//! [`request`](ApiClient::request) (or the verb helpers). Expired tokens are
//! recovered transparently through the refresh coordinator; terminal auth
//! failures clear the token store and emit a [`SessionEvent::Ended`] signal so
//! the UI can redirect to login.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::{ApiError, ErrorBody};
use crate::http::{Outcome, PreparedRequest, RequestExecutor};
use crate::refresh::RefreshCoordinator;
use crate::session::{LoginResponse, LoginSession, SessionEndReason, SessionEvent};
use crate::token::{TokenPair, TokenStore};

pub struct ApiClient {
    executor: RequestExecutor,
    tokens: Arc<TokenStore>,
    coordinator: RefreshCoordinator,
    session_tx: broadcast::Sender<SessionEvent>,
}

impl ApiClient {
    /// Build a client against `base_url` with the given token store.
    pub fn new(base_url: String, timeout: Duration, tokens: Arc<TokenStore>) -> Self {
        let (session_tx, _) = broadcast::channel(64);
        Self {
            executor: RequestExecutor::new(base_url, timeout),
            tokens,
            coordinator: RefreshCoordinator::new(session_tx.clone()),
            session_tx,
        }
    }

    /// The shared token store.
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// True when an access token is present.
    pub fn is_authenticated(&self) -> bool {
        self.tokens.get().is_some()
    }

    /// Subscribe to session started/ended signals.
    pub fn subscribe_session(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_tx.subscribe()
    }

    /// Execute an authenticated request against an API endpoint.
    ///
    /// The caller observes the original payload, the replayed payload after a
    /// transparent refresh, or a terminal error — never a response produced
    /// with a token known to be stale.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let prepared = PreparedRequest { method, url: self.executor.url(endpoint), body };
        let token = self.tokens.get().map(|pair| pair.access_token);

        match self.executor.execute(&prepared, token.as_deref()).await {
            Outcome::Ok(value) => Ok(value),
            Outcome::AuthExpired(_) => {
                self.coordinator
                    .handle_expired(&self.executor, &self.tokens, prepared, token.as_deref())
                    .await
            }
            Outcome::AuthRejected(body) => Err(ApiError::AuthRejected(body)),
            Outcome::HttpError { status, body } => Err(ApiError::Http { status, body }),
            Outcome::Transport(cause) => Err(ApiError::Transport(cause)),
        }
    }

    pub async fn get(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, endpoint, None).await
    }

    pub async fn post(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::POST, endpoint, Some(body)).await
    }

    pub async fn put(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::PUT, endpoint, Some(body)).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.request(Method::DELETE, endpoint, None).await
    }

    /// Fetch the product catalog.
    pub async fn products(&self) -> Result<Value, ApiError> {
        self.get("/products").await
    }

    /// Fetch the order list.
    pub async fn orders(&self) -> Result<Value, ApiError> {
        self.get("/orders").await
    }

    /// Fetch dashboard aggregates.
    pub async fn dashboard_stats(&self) -> Result<Value, ApiError> {
        self.get("/dashboard/stats").await
    }

    /// `POST /auth/login`. On success the returned pair is stored and a
    /// `Started` signal is emitted; on failure the server's error propagates
    /// unchanged.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<LoginSession, ApiError> {
        let prepared = PreparedRequest {
            method: Method::POST,
            url: self.executor.url("/auth/login"),
            body: Some(serde_json::json!({
                "email": email,
                "password": password,
                "rememberMe": remember_me,
            })),
        };

        let value = match self.executor.execute(&prepared, None).await {
            Outcome::Ok(value) => value,
            Outcome::AuthExpired(body) | Outcome::AuthRejected(body) => {
                return Err(ApiError::AuthRejected(body));
            }
            Outcome::HttpError { status, body } => {
                return Err(ApiError::Http { status, body });
            }
            Outcome::Transport(cause) => return Err(ApiError::Transport(cause)),
        };

        let resp: LoginResponse = serde_json::from_value(value)
            .map_err(|e| ApiError::Transport(format!("invalid login response: {e}")))?;
        let tokens = match resp.tokens {
            Some(tokens) if resp.success => TokenPair::from(tokens),
            _ => {
                return Err(ApiError::AuthRejected(ErrorBody::new(
                    "LOGIN_FAILED",
                    "login did not return a token pair",
                )));
            }
        };

        self.tokens.set(&tokens);
        let _ = self.session_tx.send(SessionEvent::Started { tokens: tokens.clone() });
        tracing::info!(email, "session started");
        Ok(LoginSession { tokens, user: resp.user })
    }

    /// Best-effort server invalidation, then unconditional local teardown.
    ///
    /// A failed `/auth/logout` call is logged and swallowed; the local clear
    /// and the `Ended` signal happen regardless.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.tokens.refresh_token() {
            let result = self
                .executor
                .client()
                .post(self.executor.url("/auth/logout"))
                .json(&serde_json::json!({ "refreshToken": refresh_token }))
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!("server-side logout acknowledged");
                }
                Ok(resp) => {
                    tracing::warn!(status = %resp.status(), "server-side logout rejected");
                }
                Err(e) => {
                    tracing::warn!(err = %e, "server-side logout failed");
                }
            }
        }
        self.tokens.clear();
        let _ = self.session_tx.send(SessionEvent::Ended { reason: SessionEndReason::UserLogout });
        tracing::info!("session ended (user logout)");
    }
}
