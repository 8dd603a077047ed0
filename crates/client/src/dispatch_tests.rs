// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{ChannelEvent, EventDispatcher, Notification};

#[test]
fn dispatch_invokes_listeners_in_registration_order() {
    let dispatcher = EventDispatcher::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for tag in 1..=3u32 {
        let order = Arc::clone(&order);
        dispatcher.add_listener(ChannelEvent::OrderUpdated, move |_| {
            order.lock().expect("lock").push(tag);
        });
    }

    dispatcher.dispatch(ChannelEvent::OrderUpdated, &serde_json::json!({}));
    assert_eq!(*order.lock().expect("lock"), vec![1, 2, 3]);
}

#[test]
fn panicking_listener_does_not_starve_siblings() {
    let dispatcher = EventDispatcher::new();
    let recorded = Arc::new(Mutex::new(None));

    dispatcher.add_listener(ChannelEvent::Notification, |_| {
        panic!("listener blew up");
    });
    {
        let recorded = Arc::clone(&recorded);
        dispatcher.add_listener(ChannelEvent::Notification, move |payload| {
            *recorded.lock().expect("lock") = payload.get("title").cloned();
        });
    }

    dispatcher.dispatch(ChannelEvent::Notification, &serde_json::json!({ "title": "hi" }));
    assert_eq!(*recorded.lock().expect("lock"), Some(serde_json::json!("hi")));
}

#[test]
fn dispatch_survives_a_panic_on_subsequent_rounds() {
    let dispatcher = EventDispatcher::new();
    let count = Arc::new(AtomicUsize::new(0));

    dispatcher.add_listener(ChannelEvent::StockUpdated, |_| panic!("boom"));
    {
        let count = Arc::clone(&count);
        dispatcher.add_listener(ChannelEvent::StockUpdated, move |_| {
            count.fetch_add(1, Ordering::Relaxed);
        });
    }

    dispatcher.dispatch(ChannelEvent::StockUpdated, &serde_json::json!({}));
    dispatcher.dispatch(ChannelEvent::StockUpdated, &serde_json::json!({}));
    assert_eq!(count.load(Ordering::Relaxed), 2);
}

#[test]
fn unsubscribe_removes_exactly_one_listener() {
    let dispatcher = EventDispatcher::new();
    let f1_calls = Arc::new(AtomicUsize::new(0));
    let f2_calls = Arc::new(AtomicUsize::new(0));

    let sub1 = {
        let calls = Arc::clone(&f1_calls);
        dispatcher.add_listener(ChannelEvent::LowStockAlert, move |_| {
            calls.fetch_add(1, Ordering::Relaxed);
        })
    };
    {
        let calls = Arc::clone(&f2_calls);
        dispatcher.add_listener(ChannelEvent::LowStockAlert, move |_| {
            calls.fetch_add(1, Ordering::Relaxed);
        });
    }

    sub1.unsubscribe();
    dispatcher.dispatch(ChannelEvent::LowStockAlert, &serde_json::json!({}));

    assert_eq!(f1_calls.load(Ordering::Relaxed), 0);
    assert_eq!(f2_calls.load(Ordering::Relaxed), 1);
}

#[test]
fn remove_listener_by_id() {
    let dispatcher = EventDispatcher::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = {
        let calls = Arc::clone(&calls);
        dispatcher.add_listener(ChannelEvent::DashboardUpdate, move |_| {
            calls.fetch_add(1, Ordering::Relaxed);
        })
    };
    let id = sub.id();

    dispatcher.remove_listener(ChannelEvent::DashboardUpdate, id);
    dispatcher.dispatch(ChannelEvent::DashboardUpdate, &serde_json::json!({}));
    assert_eq!(calls.load(Ordering::Relaxed), 0);
    assert_eq!(dispatcher.listener_count(ChannelEvent::DashboardUpdate), 0);
}

#[test]
fn dispatch_without_listeners_is_a_noop() {
    let dispatcher = EventDispatcher::new();
    dispatcher.dispatch(ChannelEvent::AdminAnnouncement, &serde_json::json!({}));
}

#[test]
fn tags_map_to_canonical_events_and_back() {
    let inbound = [
        ChannelEvent::Notification,
        ChannelEvent::UnreadCountUpdated,
        ChannelEvent::OrderUpdated,
        ChannelEvent::DashboardUpdate,
        ChannelEvent::AdminAnnouncement,
        ChannelEvent::InventoryUpdated,
        ChannelEvent::StockUpdated,
        ChannelEvent::InventoryStockUpdated,
        ChannelEvent::LowStockAlert,
    ];
    for event in inbound {
        assert_eq!(ChannelEvent::from_tag(event.as_str()), Some(event));
    }
    assert_eq!(ChannelEvent::from_tag("no_such_event"), None);
    // Local-only event never arrives from the wire.
    assert_eq!(ChannelEvent::from_tag("connection_degraded"), None);
}

#[test]
fn synthesized_notifications_get_unique_ids() {
    let a = Notification::synthesize("Low stock", "Widget is low", "warning");
    let b = Notification::synthesize("Low stock", "Widget is low", "warning");
    assert_ne!(a.id, b.id);
    assert_eq!(a.kind, "warning");
}
