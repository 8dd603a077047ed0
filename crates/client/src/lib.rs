// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shopwire: authenticated request pipeline and realtime event channel for
//! the e-commerce admin app.
//!
//! The library exposes two contracts the rest of the app consumes:
//! [`client::ApiClient::request`] for authenticated HTTP with transparent
//! single-flight token refresh, and
//! [`dispatch::EventDispatcher::add_listener`] for server-pushed events
//! arriving over the [`channel::RealtimeChannel`].

pub mod channel;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod refresh;
pub mod session;
pub mod token;

use std::sync::Arc;

use crate::channel::RealtimeChannel;
use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::dispatch::{ChannelEvent, EventDispatcher};
use crate::session::SessionEvent;
use crate::token::TokenStore;

/// Run the watch binary: log in (unless a persisted token is usable), connect
/// the realtime channel, and log events until interrupted.
pub async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let tokens = Arc::new(TokenStore::with_state_dir(&config.state_dir()));
    let client = ApiClient::new(
        config.base_url.clone(),
        config.request_timeout(),
        Arc::clone(&tokens),
    );

    if !client.is_authenticated() {
        let (email, password) = match (&config.email, &config.password) {
            (Some(e), Some(p)) => (e.clone(), p.clone()),
            _ => anyhow::bail!("no stored session; pass --email and --password to log in"),
        };
        client.login(&email, &password, true).await?;
    }

    let dispatcher = EventDispatcher::new();
    for event in [
        ChannelEvent::Notification,
        ChannelEvent::OrderUpdated,
        ChannelEvent::StockUpdated,
        ChannelEvent::LowStockAlert,
        ChannelEvent::AdminAnnouncement,
        ChannelEvent::ConnectionDegraded,
    ] {
        dispatcher.add_listener(event, move |payload| {
            tracing::info!(event = event.as_str(), %payload, "channel event");
        });
    }

    let channel = RealtimeChannel::new(
        config.ws_url.clone(),
        Arc::clone(&tokens),
        dispatcher,
        config.reconnect_policy(),
    );
    channel.connect()?;
    channel.subscribe_inventory_updates();

    // Surface session signals (e.g. refresh failure forcing re-login).
    let mut session_rx = client.subscribe_session();
    tokio::spawn(async move {
        while let Ok(event) = session_rx.recv().await {
            match event {
                SessionEvent::Started { .. } => tracing::info!("session started"),
                SessionEvent::Ended { reason } => {
                    tracing::warn!(reason = reason.as_str(), "session ended");
                }
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    channel.disconnect();
    Ok(())
}
