// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types published on the fleet event bus.
//!
//! An event records something that already happened. It is built at the
//! moment of the state change and never mutated afterwards.

use crate::id::EventId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Closed set of event kinds. Subscriptions are keyed by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    // -- worker --
    #[serde(rename = "worker:created")]
    WorkerCreated,
    #[serde(rename = "worker:started")]
    WorkerStarted,
    #[serde(rename = "worker:paused")]
    WorkerPaused,
    #[serde(rename = "worker:resumed")]
    WorkerResumed,
    #[serde(rename = "worker:stopped")]
    WorkerStopped,
    #[serde(rename = "worker:completed")]
    WorkerCompleted,
    #[serde(rename = "worker:failed")]
    WorkerFailed,
    #[serde(rename = "worker:restart_scheduled")]
    WorkerRestartScheduled,
    #[serde(rename = "worker:gave_up")]
    WorkerGaveUp,
    #[serde(rename = "worker:removed")]
    WorkerRemoved,

    // -- resource --
    #[serde(rename = "resource:checked_out")]
    ResourceCheckedOut,
    #[serde(rename = "resource:returned")]
    ResourceReturned,

    // -- pool --
    #[serde(rename = "pool:refreshed")]
    PoolRefreshed,
    #[serde(rename = "pool:closed")]
    PoolClosed,

    // -- group --
    #[serde(rename = "group:launched")]
    GroupLaunched,
    #[serde(rename = "group:stopped")]
    GroupStopped,

    // -- registry --
    #[serde(rename = "registry:reloaded")]
    RegistryReloaded,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 17] = [
        EventKind::WorkerCreated,
        EventKind::WorkerStarted,
        EventKind::WorkerPaused,
        EventKind::WorkerResumed,
        EventKind::WorkerStopped,
        EventKind::WorkerCompleted,
        EventKind::WorkerFailed,
        EventKind::WorkerRestartScheduled,
        EventKind::WorkerGaveUp,
        EventKind::WorkerRemoved,
        EventKind::ResourceCheckedOut,
        EventKind::ResourceReturned,
        EventKind::PoolRefreshed,
        EventKind::PoolClosed,
        EventKind::GroupLaunched,
        EventKind::GroupStopped,
        EventKind::RegistryReloaded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::WorkerCreated => "worker:created",
            EventKind::WorkerStarted => "worker:started",
            EventKind::WorkerPaused => "worker:paused",
            EventKind::WorkerResumed => "worker:resumed",
            EventKind::WorkerStopped => "worker:stopped",
            EventKind::WorkerCompleted => "worker:completed",
            EventKind::WorkerFailed => "worker:failed",
            EventKind::WorkerRestartScheduled => "worker:restart_scheduled",
            EventKind::WorkerGaveUp => "worker:gave_up",
            EventKind::WorkerRemoved => "worker:removed",
            EventKind::ResourceCheckedOut => "resource:checked_out",
            EventKind::ResourceReturned => "resource:returned",
            EventKind::PoolRefreshed => "pool:refreshed",
            EventKind::PoolClosed => "pool:closed",
            EventKind::GroupLaunched => "group:launched",
            EventKind::GroupStopped => "group:stopped",
            EventKind::RegistryReloaded => "registry:reloaded",
        }
    }

    /// Kinds that report a worker failure to observers.
    pub fn is_failure(self) -> bool {
        matches!(self, EventKind::WorkerFailed | EventKind::WorkerGaveUp)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Immutable notification of a state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Who produced the event: an instance id, a pool name, a group name.
    pub source: String,
    pub timestamp_ms: u64,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(kind: EventKind, source: impl Into<String>) -> Self {
        Self {
            id: EventId::generate(),
            kind,
            source: source.into(),
            timestamp_ms: now_epoch_ms(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// String field from the payload, if present.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Short one-line description for logs.
    pub fn log_summary(&self) -> String {
        if self.data.is_null() {
            format!("{} src={}", self.kind, self.source)
        } else {
            format!("{} src={} {}", self.kind, self.source, self.data)
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
