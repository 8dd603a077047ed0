// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight token refresh.
//!
//! N requests can observe an expired token at the same time; only one of them
//! may hit `/auth/refresh-token`, because the server rotates refresh tokens —
//! a second refresh with the same token would be rejected and kill the
//! session for everyone. The first observer becomes the leader and performs
//! the refresh; the rest park in a FIFO queue of deferred handles. On success
//! the leader replays every queued request (oldest first) with the new access
//! token; on failure every waiter gets the same terminal error.

use tokio::sync::{broadcast, oneshot, Mutex};

use crate::error::ApiError;
use crate::http::{Outcome, PreparedRequest, RequestExecutor};
use crate::session::{RefreshResponse, SessionEndReason, SessionEvent};
use crate::token::{TokenPair, TokenStore};

/// A caller parked while a refresh is in flight. Resolved by the leader with
/// the outcome of replaying `prepared`, or rejected with the refresh error.
struct PendingRequest {
    prepared: PreparedRequest,
    tx: oneshot::Sender<Result<serde_json::Value, ApiError>>,
}

enum RefreshState {
    Idle,
    Refreshing { queue: Vec<PendingRequest> },
}

/// Owns the refresh state machine and its waiter queue.
///
/// The queue is mutated only inside [`handle_expired`](Self::handle_expired);
/// no other component enqueues or dequeues directly.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    session_tx: broadcast::Sender<SessionEvent>,
}

impl RefreshCoordinator {
    pub fn new(session_tx: broadcast::Sender<SessionEvent>) -> Self {
        Self { state: Mutex::new(RefreshState::Idle), session_tx }
    }

    /// Entry point for a request that came back `AuthExpired`.
    ///
    /// `stale_token` is the access token the failed request was sent with.
    /// If the store already holds a different token when the 401 arrives, a
    /// refresh has settled in the meantime; the request is replayed with the
    /// current token and the (single-use) refresh token is not spent again.
    /// Otherwise the caller either performs the refresh (leader) or joins the
    /// in-flight one (follower).
    pub async fn handle_expired(
        &self,
        executor: &RequestExecutor,
        tokens: &TokenStore,
        prepared: PreparedRequest,
        stale_token: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        enum Role {
            Leader { refresh_token: String },
            Follower(oneshot::Receiver<Result<serde_json::Value, ApiError>>),
            Replay { access_token: String },
            NoSession,
        }

        // Role assignment, the stale-token check, and the refresh-token read
        // all happen under the state lock, so a rotation that settles between
        // the 401 and this point is always observed.
        let role = {
            let mut state = self.state.lock().await;
            match &mut *state {
                RefreshState::Refreshing { queue } => {
                    let (tx, rx) = oneshot::channel();
                    queue.push(PendingRequest { prepared: prepared.clone(), tx });
                    Role::Follower(rx)
                }
                RefreshState::Idle => match tokens.get() {
                    Some(pair) if stale_token != Some(pair.access_token.as_str()) => {
                        Role::Replay { access_token: pair.access_token }
                    }
                    _ => match tokens.refresh_token() {
                        Some(refresh_token) => {
                            *state = RefreshState::Refreshing { queue: Vec::new() };
                            Role::Leader { refresh_token }
                        }
                        None => {
                            // No way to recover. Terminal: clear and signal.
                            tokens.clear();
                            let _ = self.session_tx.send(SessionEvent::Ended {
                                reason: SessionEndReason::NoRefreshToken,
                            });
                            Role::NoSession
                        }
                    },
                },
            }
        };

        let refresh_token = match role {
            Role::Follower(rx) => {
                return rx.await.unwrap_or_else(|_| {
                    Err(ApiError::RefreshFailed("refresh coordinator dropped the waiter".into()))
                });
            }
            Role::Replay { access_token } => {
                tracing::debug!("token already rotated, replaying without a refresh");
                return replay(executor, &prepared, &access_token).await;
            }
            Role::NoSession => {
                return Err(ApiError::AuthRejected(crate::error::ErrorBody::new(
                    "NO_REFRESH_TOKEN",
                    "session expired and no refresh token is available",
                )));
            }
            Role::Leader { refresh_token } => refresh_token,
        };

        // Leader path: exactly one refresh call, then drain the queue.
        let refreshed = do_refresh(executor, &refresh_token).await;

        // Install (or clear) the pair and restore Idle in one critical
        // section, so the next expiry observes the rotated token and never a
        // gap in which it could spend the old refresh token again.
        let queue = {
            let mut state = self.state.lock().await;
            match &refreshed {
                Ok(pair) => tokens.set(pair),
                Err(_) => tokens.clear(),
            }
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { queue } => queue,
                RefreshState::Idle => Vec::new(),
            }
        };

        match refreshed {
            Ok(pair) => {
                tracing::debug!(waiters = queue.len(), "token refresh succeeded");
                let access = pair.access_token;
                let own = replay(executor, &prepared, &access).await;
                for waiter in queue {
                    let result = replay(executor, &waiter.prepared, &access).await;
                    let _ = waiter.tx.send(result);
                }
                own
            }
            Err(err) => {
                tracing::warn!(err = %err, waiters = queue.len(), "token refresh failed");
                let _ = self
                    .session_tx
                    .send(SessionEvent::Ended { reason: SessionEndReason::RefreshFailed });
                for waiter in queue {
                    let _ = waiter.tx.send(Err(err.clone()));
                }
                Err(err)
            }
        }
    }
}

/// Re-issue an original request with the refreshed access token.
///
/// A replay that still reports expiry is terminal — it never re-enters the
/// coordinator, so a misbehaving server cannot cause a refresh loop.
async fn replay(
    executor: &RequestExecutor,
    prepared: &PreparedRequest,
    access_token: &str,
) -> Result<serde_json::Value, ApiError> {
    match executor.execute(prepared, Some(access_token)).await {
        Outcome::Ok(value) => Ok(value),
        Outcome::AuthExpired(body) | Outcome::AuthRejected(body) => {
            Err(ApiError::AuthRejected(body))
        }
        Outcome::HttpError { status, body } => Err(ApiError::Http { status, body }),
        Outcome::Transport(cause) => Err(ApiError::Transport(cause)),
    }
}

/// Perform the single refresh call.
///
/// Non-2xx, `success: false`, or a missing token object all count as refresh
/// failure — the caller clears the session either way.
pub async fn do_refresh(
    executor: &RequestExecutor,
    refresh_token: &str,
) -> Result<TokenPair, ApiError> {
    let resp = executor
        .client()
        .post(executor.url("/auth/refresh-token"))
        .json(&serde_json::json!({ "refreshToken": refresh_token }))
        .send()
        .await
        .map_err(|e| ApiError::RefreshFailed(e.to_string()))?;

    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(ApiError::RefreshFailed(format!("refresh failed ({status}): {text}")));
    }

    let parsed: RefreshResponse = serde_json::from_str(&text)
        .map_err(|e| ApiError::RefreshFailed(format!("invalid refresh response: {e}")))?;
    if !parsed.success {
        return Err(ApiError::RefreshFailed("refresh endpoint reported failure".into()));
    }
    match parsed.tokens {
        Some(tokens) => Ok(tokens.into()),
        None => Err(ApiError::RefreshFailed("refresh response missing tokens".into())),
    }
}
