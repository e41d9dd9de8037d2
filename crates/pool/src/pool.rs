// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent-safe pool of finite-use accounts.
//!
//! The pool is the only writer of account state. Checkout, return and
//! refresh take the write lock, so they are totally ordered; stats and
//! listings take the read lock and always see a coherent working set.

use crate::config::{PoolConfig, WaitPolicy};
use crate::error::PoolError;
use crate::source::AccountSource;
use crate::watch::PoolWatcher;
use fleet_core::{now_epoch_ms, Account, AccountId, AccountState, ReturnOutcome};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Notify;

/// Point-in-time counts, taken under one lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub available: usize,
    pub in_use: usize,
    pub completed: usize,
    pub failed: usize,
}

/// What a refresh changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub added: Vec<AccountId>,
    pub removed: Vec<AccountId>,
    /// In-use accounts that vanished upstream; dropped when returned.
    pub orphaned: Vec<AccountId>,
    pub total: usize,
}

struct PoolInner {
    accounts: Vec<Account>,
    orphaned: HashSet<AccountId>,
    closed: bool,
}

impl PoolInner {
    fn position(&self, id: &AccountId) -> Option<usize> {
        self.accounts.iter().position(|a| &a.id == id)
    }
}

pub struct ResourcePool {
    config: PoolConfig,
    source: Arc<dyn AccountSource>,
    inner: RwLock<PoolInner>,
    /// Woken whenever an account may have become available or the pool closed.
    changed: Notify,
    /// Held from load to apply so refreshes land in the order they read.
    refreshing: Mutex<()>,
    watcher: Mutex<Option<PoolWatcher>>,
}

impl std::fmt::Debug for ResourcePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool")
            .field("name", &self.config.name)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ResourcePool {
    /// Create a pool and load its initial working set from `source`.
    pub fn new(config: PoolConfig, source: impl AccountSource) -> Result<Self, PoolError> {
        let pool = Self {
            config,
            source: Arc::new(source),
            inner: RwLock::new(PoolInner {
                accounts: Vec::new(),
                orphaned: HashSet::new(),
                closed: false,
            }),
            changed: Notify::new(),
            refreshing: Mutex::new(()),
            watcher: Mutex::new(None),
        };
        let summary = pool.refresh()?;
        tracing::info!(
            pool = %pool.config.name,
            source = %pool.source.describe(),
            accounts = summary.total,
            "pool loaded"
        );
        Ok(pool)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Check out an account now, without waiting.
    pub fn try_checkout(&self) -> Result<Account, PoolError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(PoolError::PoolClosed);
        }
        let idx = self
            .config
            .policy
            .select(&inner.accounts, self.config.max_failures)
            .ok_or(PoolError::ResourceExhausted)?;

        let account = &mut inner.accounts[idx];
        account.state = AccountState::InUse;
        account.last_checkout_ms = Some(now_epoch_ms());
        tracing::debug!(pool = %self.config.name, account = %account.id, "checked out");
        Ok(account.clone())
    }

    /// Check out an account, waiting per the pool's [`WaitPolicy`].
    pub async fn checkout(&self) -> Result<Account, PoolError> {
        self.checkout_until(std::future::pending()).await
    }

    /// Like [`checkout`](Self::checkout), but gives up with `Cancelled` as
    /// soon as `cancel` resolves.
    pub async fn checkout_until<F>(&self, cancel: F) -> Result<Account, PoolError>
    where
        F: Future<Output = ()>,
    {
        let max_wait = match self.config.wait {
            WaitPolicy::FailFast => return self.try_checkout(),
            WaitPolicy::Bounded(d) => Some(d),
            WaitPolicy::Indefinite => None,
        };
        let deadline = max_wait.map(|d| tokio::time::Instant::now() + d);

        tokio::pin!(cancel);
        loop {
            // Register interest before looking, so a return that lands
            // between the look and the wait still wakes us.
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_checkout() {
                Err(PoolError::ResourceExhausted) => {}
                other => return other,
            }

            let timeout = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                _ = &mut cancel => {
                    tracing::debug!(pool = %self.config.name, "checkout cancelled");
                    return Err(PoolError::Cancelled);
                }
                _ = &mut notified => {}
                _ = timeout => {
                    return match self.try_checkout() {
                        Err(PoolError::ResourceExhausted) => {
                            Err(PoolError::Timeout(max_wait.unwrap_or_default()))
                        }
                        other => other,
                    };
                }
            }
        }
    }

    /// Hand back a checked-out account. Returns the account's new state.
    pub fn return_account(
        &self,
        id: &AccountId,
        outcome: ReturnOutcome,
    ) -> Result<AccountState, PoolError> {
        let new_state = {
            let mut inner = self.inner.write();
            let idx = inner
                .position(id)
                .ok_or_else(|| PoolError::UnknownAccount(id.clone()))?;
            let account = &mut inner.accounts[idx];
            if account.state != AccountState::InUse {
                return Err(PoolError::NotInUse(id.clone()));
            }

            account.state = match &outcome {
                ReturnOutcome::Released => AccountState::Available,
                ReturnOutcome::Succeeded => {
                    account.uses += 1;
                    AccountState::Completed
                }
                ReturnOutcome::Failed { reason } => {
                    account.failures += 1;
                    account.last_error = Some(reason.clone());
                    if self.config.retry_failed && account.failures < self.config.max_failures {
                        AccountState::Available
                    } else {
                        AccountState::Failed
                    }
                }
            };
            let new_state = account.state;

            if inner.orphaned.remove(id) {
                inner.accounts.remove(idx);
                tracing::info!(pool = %self.config.name, account = %id, "dropped orphaned account on return");
            }
            new_state
        };

        tracing::debug!(
            pool = %self.config.name,
            account = %id,
            outcome = outcome.name(),
            state = %new_state,
            "returned"
        );
        self.changed.notify_waiters();
        Ok(new_state)
    }

    /// Re-derive the working set from the source.
    ///
    /// In-use accounts are never touched. New records join as available,
    /// known records get their fields updated, and records that disappeared
    /// are dropped unless in use. Records the source lists but could not
    /// read keep their previous state and counters.
    pub fn refresh(&self) -> Result<RefreshSummary, PoolError> {
        let _refreshing = self.refreshing.lock();
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }
        let snapshot = self.source.load()?;
        let now = now_epoch_ms();

        let summary = {
            let mut inner = self.inner.write();
            if inner.closed {
                return Err(PoolError::PoolClosed);
            }

            let mut incoming: HashMap<AccountId, _> = snapshot
                .records
                .into_iter()
                .map(|r| (r.id.clone(), r))
                .collect();
            let unreadable: HashSet<AccountId> = snapshot.unreadable.into_iter().collect();
            let mut summary = RefreshSummary::default();
            let mut kept = Vec::with_capacity(inner.accounts.len());

            for mut account in std::mem::take(&mut inner.accounts) {
                match incoming.remove(&account.id) {
                    Some(record) => {
                        if account.state != AccountState::InUse {
                            account.fields = record.fields;
                        }
                        inner.orphaned.remove(&account.id);
                        kept.push(account);
                    }
                    None if unreadable.contains(&account.id) => {
                        inner.orphaned.remove(&account.id);
                        kept.push(account);
                    }
                    None if account.state == AccountState::InUse => {
                        if inner.orphaned.insert(account.id.clone()) {
                            summary.orphaned.push(account.id.clone());
                        }
                        kept.push(account);
                    }
                    None => summary.removed.push(account.id),
                }
            }

            let mut added: Vec<_> = incoming.into_values().collect();
            added.sort_by(|a, b| a.id.cmp(&b.id));
            for record in added {
                summary.added.push(record.id.clone());
                kept.push(Account::from_record(record, now));
            }

            self.config.policy.order(&mut kept);
            inner.accounts = kept;
            summary.total = inner.accounts.len();
            summary
        };

        if !summary.added.is_empty() || !summary.removed.is_empty() {
            tracing::info!(
                pool = %self.config.name,
                added = summary.added.len(),
                removed = summary.removed.len(),
                total = summary.total,
                "pool refreshed"
            );
        }
        self.changed.notify_waiters();
        Ok(summary)
    }

    /// Clear an account's failures and make it available again.
    pub fn reset_account(&self, id: &AccountId) -> Result<(), PoolError> {
        {
            let mut inner = self.inner.write();
            let idx = inner
                .position(id)
                .ok_or_else(|| PoolError::UnknownAccount(id.clone()))?;
            let account = &mut inner.accounts[idx];
            if account.state == AccountState::InUse {
                return Err(PoolError::InUse(id.clone()));
            }
            account.state = AccountState::Available;
            account.failures = 0;
            account.last_error = None;
        }
        tracing::info!(pool = %self.config.name, account = %id, "account reset");
        self.changed.notify_waiters();
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.read();
        let mut stats = PoolStats {
            total: inner.accounts.len(),
            ..PoolStats::default()
        };
        for account in &inner.accounts {
            match account.state {
                AccountState::Available => stats.available += 1,
                AccountState::InUse => stats.in_use += 1,
                AccountState::Completed => stats.completed += 1,
                AccountState::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Snapshot of the working set in policy order.
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts = self.inner.read().accounts.clone();
        self.config.policy.order(&mut accounts);
        accounts
    }

    pub fn account(&self, id: &AccountId) -> Option<Account> {
        let inner = self.inner.read();
        inner.position(id).map(|i| inner.accounts[i].clone())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    /// Stop handing out accounts and release the directory watcher.
    ///
    /// Returns are still accepted so workers can hand back what they hold.
    pub fn close(&self) {
        {
            let mut inner = self.inner.write();
            if inner.closed {
                return;
            }
            inner.closed = true;
        }
        self.watcher.lock().take();
        tracing::info!(pool = %self.config.name, "pool closed");
        self.changed.notify_waiters();
    }

    /// Refresh automatically when the source's directory changes.
    ///
    /// Returns `false` if the source has nothing to watch.
    pub fn watch_source(self: &Arc<Self>) -> Result<bool, PoolError> {
        let Some(path) = self.source.watch_path() else {
            return Ok(false);
        };
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }
        let watcher = PoolWatcher::start(Arc::downgrade(self), path)
            .map_err(|e| PoolError::Watch(e.to_string()))?;
        *self.watcher.lock() = Some(watcher);
        tracing::info!(pool = %self.config.name, path = %path.display(), "watching account source");
        Ok(true)
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.lock().is_some()
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
