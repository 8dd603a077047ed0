// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime event channel: one persistent WebSocket connection, authenticated
//! with the current access token, reconnecting with bounded exponential
//! backoff. Inbound tagged messages fan out through the [`EventDispatcher`];
//! outbound operations are fire-and-forget and silently dropped while
//! disconnected — callers must not assume delivery.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{ChannelEvent, EventDispatcher};
use crate::error::{ApiError, ErrorBody};
use crate::token::TokenStore;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

/// Reconnection tuning.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Give up after this many consecutive failed connect attempts.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

pub struct RealtimeChannel {
    ws_url: String,
    tokens: Arc<TokenStore>,
    dispatcher: EventDispatcher,
    policy: ReconnectPolicy,
    state: Mutex<ChannelState>,
    /// Writer handle for the live connection; `None` while disconnected.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// Subscription intents to replay on every (re)connect.
    pending_subs: Mutex<Vec<String>>,
    cancel: Mutex<CancellationToken>,
    unread_count: AtomicU64,
}

impl RealtimeChannel {
    pub fn new(
        ws_url: String,
        tokens: Arc<TokenStore>,
        dispatcher: EventDispatcher,
        policy: ReconnectPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            ws_url,
            tokens,
            dispatcher,
            policy,
            state: Mutex::new(ChannelState::Disconnected),
            outbound: Mutex::new(None),
            pending_subs: Mutex::new(Vec::new()),
            cancel: Mutex::new(CancellationToken::new()),
            unread_count: AtomicU64::new(0),
        })
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Unread notification counter, fed by `unread_count_updated` events.
    pub fn unread_count(&self) -> u64 {
        self.unread_count.load(Ordering::Relaxed)
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Start the connection loop. Refuses to connect without an access token;
    /// the channel never authenticates with nothing.
    pub fn connect(self: &Arc<Self>) -> Result<(), ApiError> {
        if self.tokens.get().is_none() {
            return Err(ApiError::AuthRejected(ErrorBody::new(
                "NOT_AUTHENTICATED",
                "realtime channel requires an access token",
            )));
        }
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state != ChannelState::Disconnected {
                return Ok(());
            }
            *state = ChannelState::Connecting;
        }

        let cancel = CancellationToken::new();
        {
            // Retire any loop still backing off from a natural drop before
            // handing the state to the new one.
            let mut slot = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
            slot.cancel();
            *slot = cancel.clone();
        }

        let channel = Arc::clone(self);
        tokio::spawn(async move {
            channel.run(cancel).await;
        });
        Ok(())
    }

    /// Explicit teardown from any state. Idempotent.
    pub fn disconnect(&self) {
        self.cancel.lock().unwrap_or_else(|e| e.into_inner()).cancel();
        *self.outbound.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.set_state(ChannelState::Disconnected);
    }

    /// Register interest in inventory updates. Remembered across reconnects;
    /// emitted immediately when connected.
    pub fn subscribe_inventory_updates(&self) {
        {
            let mut subs = self.pending_subs.lock().unwrap_or_else(|e| e.into_inner());
            if !subs.iter().any(|s| s == "subscribe_inventory_updates") {
                subs.push("subscribe_inventory_updates".to_owned());
            }
        }
        self.emit("subscribe_inventory_updates", serde_json::json!({}));
    }

    pub fn unsubscribe_inventory_updates(&self) {
        self.pending_subs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|s| s != "subscribe_inventory_updates");
        self.emit("unsubscribe_inventory_updates", serde_json::json!({}));
    }

    /// Push a stock change for a product. Fire-and-forget.
    pub fn update_product_stock(&self, product_id: &str, stock: i64) {
        self.emit(
            "update_product_stock",
            serde_json::json!({ "productId": product_id, "stock": stock }),
        );
    }

    /// Broadcast a low-stock alert to other admin sessions. Fire-and-forget.
    pub fn send_low_stock_alert(&self, product_id: &str, product_name: &str, stock: i64) {
        self.emit(
            "inventory_low_stock_alert",
            serde_json::json!({
                "productId": product_id,
                "productName": product_name,
                "stock": stock,
            }),
        );
    }

    /// Tell the server a notification was read. Fire-and-forget.
    pub fn mark_notification_read(&self, notification_id: &str) {
        self.emit("notification_read", serde_json::json!({ "notificationId": notification_id }));
    }

    /// Send a tagged message if connected; drop it otherwise.
    fn emit(&self, event: &str, mut payload: serde_json::Value) -> bool {
        let outbound = self.outbound.lock().unwrap_or_else(|e| e.into_inner());
        let Some(ref tx) = *outbound else {
            tracing::debug!(event, "channel not connected, emission dropped");
            return false;
        };
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("event".to_owned(), serde_json::json!(event));
        }
        tx.send(payload.to_string()).is_ok()
    }

    fn set_state(&self, next: ChannelState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    /// Connection loop: connect, pump, reconnect with backoff, give up after
    /// the configured number of consecutive failures.
    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut attempts = 0u32;
        let mut backoff = self.policy.base_backoff;

        loop {
            if cancel.is_cancelled() {
                return;
            }
            let Some(pair) = self.tokens.get() else {
                // Token cleared underneath us (logout, refresh failure).
                tracing::debug!("no access token, stopping channel");
                break;
            };

            self.set_state(ChannelState::Connecting);
            let url = build_ws_url(&self.ws_url, &pair.access_token);

            match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((stream, _)) => {
                    attempts = 0;
                    backoff = self.policy.base_backoff;
                    self.pump(stream, &cancel).await;
                    if cancel.is_cancelled() {
                        // disconnect() already wrote the teardown, and a
                        // newer connect() may own the state by now.
                        return;
                    }
                    // Connection dropped on its own.
                    *self.outbound.lock().unwrap_or_else(|e| e.into_inner()) = None;
                    self.set_state(ChannelState::Disconnected);
                }
                Err(e) => {
                    if cancel.is_cancelled() {
                        return;
                    }
                    tracing::debug!(err = %e, "channel connect failed");
                    self.set_state(ChannelState::Disconnected);
                    attempts += 1;
                    if attempts >= self.policy.max_attempts {
                        tracing::warn!(attempts, "channel reconnect attempts exhausted");
                        self.dispatcher.dispatch(
                            ChannelEvent::ConnectionDegraded,
                            &serde_json::json!({ "attempts": attempts }),
                        );
                        break;
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.policy.max_backoff);
        }

        self.set_state(ChannelState::Disconnected);
    }

    /// Pump one live connection until it drops or the channel is cancelled.
    async fn pump(
        &self,
        stream: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        cancel: &CancellationToken,
    ) {
        let (mut write, mut read) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        // Announce presence, then replay standing subscription intents.
        let _ = tx.send(serde_json::json!({ "event": "user_online" }).to_string());
        {
            let subs = self.pending_subs.lock().unwrap_or_else(|e| e.into_inner());
            for sub in subs.iter() {
                let _ = tx.send(serde_json::json!({ "event": sub }).to_string());
            }
        }
        *self.outbound.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        self.set_state(ChannelState::Connected);
        tracing::info!("realtime channel connected");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                outgoing = rx.recv() => {
                    match outgoing {
                        Some(text) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                incoming = read.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => self.handle_inbound(&text),
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {} // Ignore binary, ping, pong.
                        Some(Err(e)) => {
                            tracing::debug!(err = %e, "channel read error");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Translate one inbound tagged message into a dispatcher event.
    fn handle_inbound(&self, text: &str) {
        let Ok(msg) = serde_json::from_str::<serde_json::Value>(text) else {
            tracing::debug!("discarding malformed channel message");
            return;
        };
        let tag = msg.get("event").and_then(|v| v.as_str()).unwrap_or_default();
        let Some(event) = ChannelEvent::from_tag(tag) else {
            tracing::debug!(tag, "unknown channel event ignored");
            return;
        };

        if event == ChannelEvent::UnreadCountUpdated {
            if let Some(count) = msg.get("count").and_then(|v| v.as_u64()) {
                self.unread_count.store(count, Ordering::Relaxed);
            }
        }

        self.dispatcher.dispatch(event, &msg);
    }
}

/// Build the handshake URL carrying the access token as a query credential.
fn build_ws_url(base_url: &str, token: &str) -> String {
    let ws_base = if base_url.starts_with("https://") {
        base_url.replacen("https://", "wss://", 1)
    } else if base_url.starts_with("http://") {
        base_url.replacen("http://", "ws://", 1)
    } else {
        base_url.to_owned()
    };
    format!("{ws_base}?token={}", urlencoding(token))
}

/// Percent-encode a query value; RFC 3986 unreserved bytes pass through.
fn urlencoding(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                char::from(b).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
