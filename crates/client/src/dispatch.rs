// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed event dispatch: canonical channel event names and the listener
//! registry that fans server-pushed payloads out to UI subscribers.
//!
//! The registry is shared by [`crate::channel::RealtimeChannel`] and by any
//! in-process notification bus. Callbacks run in registration order; a
//! panicking callback is caught and logged, never starving its siblings.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Canonical event names carried over the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelEvent {
    Notification,
    UnreadCountUpdated,
    OrderUpdated,
    DashboardUpdate,
    AdminAnnouncement,
    InventoryUpdated,
    StockUpdated,
    InventoryStockUpdated,
    LowStockAlert,
    /// Local event: the channel gave up reconnecting.
    ConnectionDegraded,
}

impl ChannelEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::UnreadCountUpdated => "unread_count_updated",
            Self::OrderUpdated => "order_updated",
            Self::DashboardUpdate => "dashboard_update",
            Self::AdminAnnouncement => "admin_announcement",
            Self::InventoryUpdated => "inventory_updated",
            Self::StockUpdated => "stock_updated",
            Self::InventoryStockUpdated => "inventory_stock_updated",
            Self::LowStockAlert => "low_stock_alert",
            Self::ConnectionDegraded => "connection_degraded",
        }
    }

    /// Map an inbound wire tag to its canonical event. Unknown tags are
    /// ignored by the channel.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "notification" => Some(Self::Notification),
            "unread_count_updated" => Some(Self::UnreadCountUpdated),
            "order_updated" => Some(Self::OrderUpdated),
            "dashboard_update" => Some(Self::DashboardUpdate),
            "admin_announcement" => Some(Self::AdminAnnouncement),
            "inventory_updated" => Some(Self::InventoryUpdated),
            "stock_updated" => Some(Self::StockUpdated),
            "inventory_stock_updated" => Some(Self::InventoryStockUpdated),
            "low_stock_alert" => Some(Self::LowStockAlert),
            _ => None,
        }
    }
}

/// A push notification delivered to UI listeners. Not persisted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub priority: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

impl Notification {
    /// Synthesize a local notification (e.g. for in-process toasts).
    pub fn synthesize(title: &str, message: &str, kind: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_owned(),
            message: message.to_owned(),
            kind: kind.to_owned(),
            priority: "normal".to_owned(),
            timestamp: epoch_ms().to_string(),
            action_url: None,
        }
    }
}

type Callback = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Unique handle for a registered listener.
pub type ListenerId = u64;

struct Registry {
    listeners: Mutex<HashMap<ChannelEvent, Vec<(ListenerId, Callback)>>>,
    next_id: AtomicU64,
}

/// Per-channel listener registry. Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<Registry>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a callback. The returned [`Subscription`] removes exactly this
    /// callback, independent of others registered under the same event.
    pub fn add_listener<F>(&self, event: ChannelEvent, callback: F) -> Subscription
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.registry.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.entry(event).or_default().push((id, Arc::new(callback)));
        Subscription { registry: Arc::clone(&self.registry), event, id }
    }

    /// Remove a listener by id. No-op if already removed.
    pub fn remove_listener(&self, event: ChannelEvent, id: ListenerId) {
        remove(&self.registry, event, id);
    }

    /// Invoke every listener registered for `event`, in registration order.
    ///
    /// A panicking callback is logged and skipped; the rest still run, and
    /// future dispatches are unaffected.
    pub fn dispatch(&self, event: ChannelEvent, payload: &serde_json::Value) {
        let snapshot: Vec<(ListenerId, Callback)> = {
            let listeners = self.registry.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners.get(&event).cloned().unwrap_or_default()
        };
        for (id, callback) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
                tracing::warn!(event = event.as_str(), listener = id, "listener panicked");
            }
        }
    }

    /// Number of listeners currently registered for `event`.
    pub fn listener_count(&self, event: ChannelEvent) -> usize {
        let listeners = self.registry.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.get(&event).map(Vec::len).unwrap_or(0)
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Unsubscribe capability returned by [`EventDispatcher::add_listener`].
///
/// Dropping the handle without calling [`unsubscribe`](Self::unsubscribe)
/// keeps the listener registered.
pub struct Subscription {
    registry: Arc<Registry>,
    event: ChannelEvent,
    id: ListenerId,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove exactly the callback this subscription registered.
    pub fn unsubscribe(self) {
        remove(&self.registry, self.event, self.id);
    }
}

fn remove(registry: &Registry, event: ChannelEvent, id: ListenerId) {
    let mut listeners = registry.listeners.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(list) = listeners.get_mut(&event) {
        list.retain(|(lid, _)| *lid != id);
        if list.is_empty() {
            listeners.remove(&event);
        }
    }
}

/// Return current epoch millis.
fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
