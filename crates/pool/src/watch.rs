// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh a pool when its account directory changes.

use crate::pool::ResourcePool;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Weak;

/// Keeps the file watcher alive. Dropping it stops the watch.
pub(crate) struct PoolWatcher {
    _watcher: RecommendedWatcher,
}

impl PoolWatcher {
    /// Watch `path` and refresh the pool on every change.
    ///
    /// Holds only a weak reference, so a watcher never keeps a dropped pool
    /// alive.
    pub(crate) fn start(pool: Weak<ResourcePool>, path: &Path) -> Result<Self, notify::Error> {
        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            let Ok(event) = res else {
                return;
            };
            if event.kind.is_access() {
                return;
            }
            let Some(pool) = pool.upgrade() else {
                return;
            };
            if pool.is_closed() {
                return;
            }
            if let Err(e) = pool.refresh() {
                tracing::warn!(pool = pool.name(), error = %e, "refresh after change failed");
            }
        })?;

        watcher.watch(path, RecursiveMode::NonRecursive)?;
        Ok(Self { _watcher: watcher })
    }
}
