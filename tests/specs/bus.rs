// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use fleet_core::{Event, EventKind};
use fleet_engine::{BusConfig, EventBus};
use parking_lot::Mutex;
use serde_json::json;

const EVENTS: u64 = 200;

fn seq(e: &Event) -> u64 {
    e.data["seq"].as_u64().unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_subscriber_sees_every_event_in_order_despite_a_panicking_handler() {
    let bus = EventBus::new(BusConfig::default());
    let seen: Vec<Arc<Mutex<Vec<u64>>>> = (0..3).map(|_| Arc::new(Mutex::new(Vec::new()))).collect();

    for log in &seen {
        let log = Arc::clone(log);
        bus.subscribe(EventKind::ResourceCheckedOut, move |e: &Event| log.lock().push(seq(e)));
    }
    bus.subscribe(EventKind::ResourceCheckedOut, |_: &Event| panic!("bad handler"));

    for n in 0..EVENTS {
        assert!(bus.publish(Event::new(EventKind::ResourceCheckedOut, "pool").with_data(json!({ "seq": n }))));
    }
    bus.stop().await;

    let expected: Vec<u64> = (0..EVENTS).collect();
    for log in &seen {
        assert_eq!(*log.lock(), expected);
    }
    assert_eq!(bus.delivered_count(), EVENTS * 3);
    assert_eq!(bus.handler_panics(), EVENTS);
    assert_eq!(bus.delivered_count() + bus.handler_panics(), EVENTS * 4);
    assert_eq!(bus.dropped_count(), 0);
}

#[tokio::test]
async fn events_of_other_kinds_are_not_delivered() {
    let bus = EventBus::new(BusConfig::default());
    let count = Arc::new(Mutex::new(0u32));
    bus.subscribe(EventKind::WorkerGaveUp, {
        let count = Arc::clone(&count);
        move |_: &Event| *count.lock() += 1
    });

    bus.publish(Event::new(EventKind::WorkerStarted, "bot-1"));
    bus.publish(Event::new(EventKind::WorkerGaveUp, "bot-1"));
    bus.stop().await;

    assert_eq!(*count.lock(), 1);
    assert!(!bus.publish(Event::new(EventKind::WorkerGaveUp, "bot-1")));
}
