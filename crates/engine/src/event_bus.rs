// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide event bus.
//!
//! Publishers enqueue onto a bounded queue and never wait on subscribers.
//! A single dispatch task drains the queue in FIFO order and hands each
//! event to a snapshot of the subscribers registered for its kind, so
//! same-kind events reach a given subscriber in publish order.
//!
//! A full queue drops the event and bumps [`EventBus::dropped_count`].
//! [`EventBus::publish_async`] instead parks overflow on an unbounded
//! backlog that one forwarder task feeds into the queue in order; while
//! that backlog is non-empty the queue counts as full, so nothing jumps
//! ahead of it. A handler that panics is counted, logged, and skipped;
//! the remaining handlers still see the event.

use fleet_core::{Event, EventKind};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

/// Callback invoked on the dispatch task for each delivered event.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Opaque handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Bus tunables (`[bus]` in the daemon config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Events queued before `publish` starts dropping.
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

#[derive(Default)]
struct Subscribers {
    by_kind: HashMap<EventKind, Vec<(SubscriptionId, Handler)>>,
    all: Vec<(SubscriptionId, Handler)>,
}

impl Subscribers {
    fn snapshot(&self, kind: EventKind) -> Vec<Handler> {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flatten()
            .chain(self.all.iter())
            .map(|(_, h)| Arc::clone(h))
            .collect()
    }

    fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum::<usize>() + self.all.len()
    }
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    handler_panics: AtomicU64,
}

struct BusShared {
    subscribers: RwLock<Subscribers>,
    next_id: AtomicU64,
    stopped: AtomicBool,
    counters: Counters,
    /// Events handed to the overflow backlog and not yet queued.
    backlog: AtomicUsize,
    drain_backlog: Notify,
    shutdown: Notify,
}

impl BusShared {
    fn dispatch(&self, event: &Event) {
        let handlers = self.subscribers.read().snapshot(event.kind);
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(payload) => {
                    let total = self.counters.handler_panics.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        event = %event.kind,
                        panic = panic_message(payload.as_ref()),
                        handler_panics = total,
                        "event handler panicked"
                    );
                }
            }
        }
    }

    fn accepted(&self) {
        self.counters.published.fetch_add(1, Ordering::Relaxed);
    }

    fn drop_event(&self, event: &Event, why: &'static str) {
        let total = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(event = %event.kind, source = %event.source, dropped = total, "event dropped: {why}");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

/// Asynchronous publish/subscribe dispatcher. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<BusShared>,
    tx: mpsc::Sender<Event>,
    overflow: mpsc::UnboundedSender<Event>,
    tasks: Arc<tokio::sync::Mutex<Option<BusTasks>>>,
}

struct BusTasks {
    forwarder: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("stopped", &self.is_stopped())
            .field("dropped", &self.dropped_count())
            .finish()
    }
}

impl EventBus {
    /// Start a bus and its dispatch task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: BusConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let (overflow, overflow_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(BusShared {
            subscribers: RwLock::new(Subscribers::default()),
            next_id: AtomicU64::new(1),
            stopped: AtomicBool::new(false),
            counters: Counters::default(),
            backlog: AtomicUsize::new(0),
            drain_backlog: Notify::new(),
            shutdown: Notify::new(),
        });
        let tasks = BusTasks {
            forwarder: tokio::spawn(forward_loop(Arc::clone(&shared), tx.clone(), overflow_rx)),
            dispatcher: tokio::spawn(dispatch_loop(Arc::clone(&shared), rx)),
        };
        Self {
            shared,
            tx,
            overflow,
            tasks: Arc::new(tokio::sync::Mutex::new(Some(tasks))),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register `handler` for events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.shared
            .subscribers
            .write()
            .by_kind
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        tracing::debug!(%id, %kind, "subscribed");
        id
    }

    /// Register `handler` for every event kind.
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.shared.subscribers.write().all.push((id, Arc::new(handler)));
        tracing::debug!(%id, "subscribed to all events");
        id
    }

    /// Remove one subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.shared.subscribers.write();
        let before = subs.len();
        subs.all.retain(|(sid, _)| *sid != id);
        for handlers in subs.by_kind.values_mut() {
            handlers.retain(|(sid, _)| *sid != id);
        }
        subs.by_kind.retain(|_, handlers| !handlers.is_empty());
        subs.len() != before
    }

    fn has_backlog(&self) -> bool {
        self.shared.backlog.load(Ordering::SeqCst) > 0
    }

    /// Queue an event for dispatch without waiting.
    ///
    /// Returns `false` if the event was dropped (queue full, overflow
    /// backlog pending, or bus stopped).
    pub fn publish(&self, event: Event) -> bool {
        if self.is_stopped() {
            self.shared.drop_event(&event, "bus stopped");
            return false;
        }
        if self.has_backlog() {
            self.shared.drop_event(&event, "queue full");
            return false;
        }
        match self.tx.try_send(event) {
            Ok(()) => {
                self.shared.accepted();
                true
            }
            Err(TrySendError::Full(event)) => {
                self.shared.drop_event(&event, "queue full");
                false
            }
            Err(TrySendError::Closed(event)) => {
                self.shared.drop_event(&event, "bus closed");
                false
            }
        }
    }

    /// Queue an event, parking it on the overflow backlog if the queue is
    /// full.
    ///
    /// Never blocks the caller and never drops for back-pressure; it still
    /// drops once the bus is stopped. Events from one caller keep their
    /// order whether they went straight to the queue or through the backlog.
    pub fn publish_async(&self, event: Event) {
        if self.is_stopped() {
            self.shared.drop_event(&event, "bus stopped");
            return;
        }
        let event = if self.has_backlog() {
            event
        } else {
            match self.tx.try_send(event) {
                Ok(()) => {
                    self.shared.accepted();
                    return;
                }
                Err(TrySendError::Full(event)) => event,
                Err(TrySendError::Closed(event)) => {
                    self.shared.drop_event(&event, "bus closed");
                    return;
                }
            }
        };

        // Counted before the send so later callers see the backlog.
        self.shared.backlog.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(event)) = self.overflow.send(event) {
            self.shared.backlog.fetch_sub(1, Ordering::SeqCst);
            self.shared.drop_event(&event, "bus closed");
        }
    }

    /// Stop accepting events, deliver everything already queued or parked
    /// on the backlog, and wait for the bus tasks to exit. Safe to call more
    /// than once.
    pub async fn stop(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);

        let mut tasks = self.tasks.lock().await;
        if let Some(BusTasks {
            forwarder,
            dispatcher,
        }) = tasks.take()
        {
            // The backlog empties into the queue before dispatch winds down.
            self.shared.drain_backlog.notify_one();
            if let Err(e) = forwarder.await {
                tracing::error!(error = %e, "event forwarder task failed");
            }
            self.shared.shutdown.notify_one();
            if let Err(e) = dispatcher.await {
                tracing::error!(error = %e, "event dispatch task failed");
            }
            tracing::info!(
                published = self.published_count(),
                delivered = self.delivered_count(),
                dropped = self.dropped_count(),
                "event bus stopped"
            );
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.read().len()
    }

    /// Events accepted onto the queue.
    pub fn published_count(&self) -> u64 {
        self.shared.counters.published.load(Ordering::Relaxed)
    }

    /// Successful handler invocations.
    pub fn delivered_count(&self) -> u64 {
        self.shared.counters.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.shared.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn handler_panics(&self) -> u64 {
        self.shared.counters.handler_panics.load(Ordering::Relaxed)
    }
}

/// Moves parked overflow into the queue, one event at a time, in order.
async fn forward_loop(
    shared: Arc<BusShared>,
    tx: mpsc::Sender<Event>,
    mut overflow: mpsc::UnboundedReceiver<Event>,
) {
    loop {
        tokio::select! {
            biased;
            event = overflow.recv() => match event {
                Some(event) => forward(&shared, &tx, event).await,
                None => return,
            },
            _ = shared.drain_backlog.notified() => break,
        }
    }

    overflow.close();
    while let Some(event) = overflow.recv().await {
        forward(&shared, &tx, event).await;
    }
}

async fn forward(shared: &BusShared, tx: &mpsc::Sender<Event>, event: Event) {
    match tx.send(event).await {
        Ok(()) => shared.accepted(),
        Err(mpsc::error::SendError(event)) => shared.drop_event(&event, "bus closed"),
    }
    // Released only once the event is queued, so nobody overtakes it.
    shared.backlog.fetch_sub(1, Ordering::SeqCst);
}

async fn dispatch_loop(shared: Arc<BusShared>, mut rx: mpsc::Receiver<Event>) {
    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Some(event) => shared.dispatch(&event),
                None => return,
            },
            _ = shared.shutdown.notified() => break,
        }
    }

    // Refuse new sends, then drain what was already queued.
    rx.close();
    while let Some(event) = rx.recv().await {
        shared.dispatch(&event);
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
