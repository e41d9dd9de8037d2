// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;

fn event(kind: EventKind, n: u64) -> Event {
    Event::new(kind, "test").with_data(serde_json::json!({ "n": n }))
}

fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl Fn(&Event) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler = move |e: &Event| {
        let n = e.data.get("n").and_then(|v| v.as_u64()).unwrap_or(u64::MAX);
        sink.lock().push(n);
    };
    (seen, handler)
}

#[tokio::test]
async fn delivers_every_event_to_every_subscriber_in_order() {
    let bus = EventBus::new(BusConfig::default());
    let (a, handler_a) = recorder();
    let (b, handler_b) = recorder();
    bus.subscribe(EventKind::WorkerStarted, handler_a);
    bus.subscribe(EventKind::WorkerStarted, handler_b);

    for n in 0..50 {
        assert!(bus.publish(event(EventKind::WorkerStarted, n)));
    }
    bus.stop().await;

    let expected: Vec<u64> = (0..50).collect();
    assert_eq!(*a.lock(), expected);
    assert_eq!(*b.lock(), expected);
    assert_eq!(bus.delivered_count(), 100);
}

#[tokio::test]
async fn panicking_handler_does_not_starve_others() {
    let bus = EventBus::new(BusConfig::default());
    let (seen, handler) = recorder();
    bus.subscribe(EventKind::WorkerFailed, |_| panic!("observer bug"));
    bus.subscribe(EventKind::WorkerFailed, handler);

    for n in 0..10 {
        bus.publish(event(EventKind::WorkerFailed, n));
    }
    bus.stop().await;

    assert_eq!(seen.lock().len(), 10);
    assert_eq!(bus.handler_panics(), 10);
}

#[tokio::test]
async fn handlers_only_see_their_kind() {
    let bus = EventBus::new(BusConfig::default());
    let (started, on_started) = recorder();
    let (all, on_all) = recorder();
    bus.subscribe(EventKind::WorkerStarted, on_started);
    bus.subscribe_all(on_all);

    bus.publish(event(EventKind::WorkerStarted, 1));
    bus.publish(event(EventKind::PoolRefreshed, 2));
    bus.stop().await;

    assert_eq!(*started.lock(), vec![1]);
    assert_eq!(*all.lock(), vec![1, 2]);
}

#[tokio::test]
async fn unsubscribe_removes_exactly_one() {
    let bus = EventBus::new(BusConfig::default());
    let (kept, on_kept) = recorder();
    let (gone, on_gone) = recorder();
    bus.subscribe(EventKind::WorkerStopped, on_kept);
    let id = bus.subscribe(EventKind::WorkerStopped, on_gone);
    assert_eq!(bus.subscriber_count(), 2);

    assert!(bus.unsubscribe(id));
    assert!(!bus.unsubscribe(id));
    assert_eq!(bus.subscriber_count(), 1);

    bus.publish(event(EventKind::WorkerStopped, 7));
    bus.stop().await;
    assert_eq!(*kept.lock(), vec![7]);
    assert!(gone.lock().is_empty());
}

#[tokio::test]
async fn publish_after_stop_is_dropped() {
    let bus = EventBus::new(BusConfig::default());
    let (seen, handler) = recorder();
    bus.subscribe_all(handler);
    bus.stop().await;
    bus.stop().await;

    assert!(!bus.publish(event(EventKind::WorkerStarted, 1)));
    bus.publish_async(event(EventKind::WorkerStarted, 2));
    assert_eq!(bus.dropped_count(), 2);
    assert!(seen.lock().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn full_queue_drops_but_publish_async_waits() {
    // Nothing yields to the dispatch task until `stop`, so the queue fills.
    let bus = EventBus::new(BusConfig { capacity: 2 });
    let (seen, handler) = recorder();
    bus.subscribe_all(handler);

    assert!(bus.publish(event(EventKind::WorkerStarted, 0)));
    assert!(bus.publish(event(EventKind::WorkerStarted, 1)));
    assert!(!bus.publish(event(EventKind::WorkerStarted, 2)));
    assert_eq!(bus.dropped_count(), 1);

    bus.publish_async(event(EventKind::WorkerStarted, 3));
    assert_eq!(bus.dropped_count(), 1);

    // Stop drains the overflow backlog as well as the queue.
    bus.stop().await;

    assert_eq!(*seen.lock(), vec![0, 1, 3]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn publish_async_overflow_keeps_publish_order() {
    let bus = EventBus::new(BusConfig { capacity: 1 });
    let (seen, record) = recorder();
    bus.subscribe(EventKind::WorkerStarted, move |e: &Event| {
        std::thread::sleep(std::time::Duration::from_millis(2));
        record(e);
    });

    for n in 0..40 {
        bus.publish_async(event(EventKind::WorkerStarted, n));
    }
    bus.stop().await;

    assert_eq!(*seen.lock(), (0..40).collect::<Vec<_>>());
    assert_eq!(bus.published_count(), 40);
    assert_eq!(bus.dropped_count(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn publish_does_not_overtake_the_overflow_backlog() {
    let bus = EventBus::new(BusConfig { capacity: 1 });
    let (seen, handler) = recorder();
    bus.subscribe_all(handler);

    assert!(bus.publish(event(EventKind::WorkerStarted, 0)));
    bus.publish_async(event(EventKind::WorkerStarted, 1));
    // The backlog is pending, so the queue counts as full.
    assert!(!bus.publish(event(EventKind::WorkerStarted, 2)));
    bus.publish_async(event(EventKind::WorkerStarted, 3));
    bus.stop().await;

    assert_eq!(*seen.lock(), vec![0, 1, 3]);
    assert_eq!(bus.dropped_count(), 1);
}

#[tokio::test]
async fn subscriber_added_later_misses_earlier_events() {
    let bus = EventBus::new(BusConfig::default());
    let (early, on_early) = recorder();
    bus.subscribe(EventKind::WorkerCreated, on_early);
    bus.publish(event(EventKind::WorkerCreated, 1));

    // Wait for the first event to be dispatched.
    for _ in 0..100 {
        if !early.lock().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }

    let (late, on_late) = recorder();
    bus.subscribe(EventKind::WorkerCreated, on_late);
    bus.publish(event(EventKind::WorkerCreated, 2));
    bus.stop().await;

    assert_eq!(*early.lock(), vec![1, 2]);
    assert_eq!(*late.lock(), vec![2]);
}

#[test]
fn bus_config_defaults_capacity() {
    let config: BusConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, BusConfig { capacity: 1024 });
}
