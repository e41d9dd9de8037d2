// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One worker slot: a controller, a device handle, and at most one
//! checked-out account.
//!
//! A worker runs one routine at a time. Each run checks out a fresh
//! account (when the launch has a pool), runs the executor, and hands the
//! account back before reporting how the run ended.

use crate::event_bus::EventBus;
use crate::registry::Catalogs;
use fleet_adapters::{DeviceHandle, ExecutorError, RoutineExecutor, RunContext};
use fleet_core::{
    Account, AccountId, Event, EventKind, ExecutionController, InstanceId, ReturnOutcome,
    RoutineName,
};
use fleet_pool::{PoolError, ResourcePool};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// How a single run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Stopped,
    Failed(String),
    /// No account could be checked out. The supervisor decides whether
    /// that ends the slot or counts as a failure.
    Exhausted(String),
}

impl RunOutcome {
    fn return_outcome(&self) -> ReturnOutcome {
        match self {
            RunOutcome::Completed => ReturnOutcome::Succeeded,
            RunOutcome::Stopped | RunOutcome::Exhausted(_) => ReturnOutcome::Released,
            RunOutcome::Failed(reason) => ReturnOutcome::failed(reason.clone()),
        }
    }
}

struct HeldAccount {
    pool: Arc<ResourcePool>,
    account: AccountId,
}

pub struct Worker {
    instance_id: InstanceId,
    controller: Arc<ExecutionController>,
    device: DeviceHandle,
    catalogs: Arc<Catalogs>,
    last_routine: Mutex<Option<RoutineName>>,
    held: Mutex<Option<HeldAccount>>,
    completed_runs: AtomicU32,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("instance_id", &self.instance_id)
            .field("state", &self.controller.state())
            .field("account", &self.account())
            .finish()
    }
}

impl Worker {
    pub fn new(instance_id: InstanceId, device: DeviceHandle, catalogs: Arc<Catalogs>) -> Self {
        Self {
            instance_id,
            controller: Arc::new(ExecutionController::new()),
            device,
            catalogs,
            last_routine: Mutex::new(None),
            held: Mutex::new(None),
            completed_runs: AtomicU32::new(0),
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn controller(&self) -> &Arc<ExecutionController> {
        &self.controller
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    pub fn catalogs(&self) -> &Arc<Catalogs> {
        &self.catalogs
    }

    pub fn last_routine(&self) -> Option<RoutineName> {
        self.last_routine.lock().clone()
    }

    /// Account currently checked out by this worker.
    pub fn account(&self) -> Option<AccountId> {
        self.held.lock().as_ref().map(|h| h.account.clone())
    }

    /// Runs that ended in success since the worker was created.
    pub fn completed_runs(&self) -> u32 {
        self.completed_runs.load(Ordering::SeqCst)
    }

    fn event(&self, kind: EventKind, data: serde_json::Value) -> Event {
        Event::new(kind, self.instance_id.as_str()).with_data(data)
    }

    /// Run `routine` once. The terminal state is left for [`Worker::settle`].
    pub async fn run_once<E: RoutineExecutor>(
        &self,
        executor: &E,
        bus: &EventBus,
        routine: &RoutineName,
        pool: Option<&Arc<ResourcePool>>,
    ) -> RunOutcome {
        *self.last_routine.lock() = Some(routine.clone());
        let catalogs = self.catalogs.snapshot();
        let Some(compiled) = catalogs.routines.get(routine.as_str()) else {
            return RunOutcome::Failed(format!("routine not found: {}", routine));
        };

        let account = match pool {
            Some(pool) => match self.checkout(pool, bus).await {
                Ok(account) => Some(account),
                Err(outcome) => return outcome,
            },
            None => None,
        };
        let account_id = account.as_ref().map(|a| a.id.clone());

        // A stop that landed during checkout must not be overwritten.
        if self.controller.state().is_terminal() {
            let outcome = RunOutcome::Stopped;
            self.return_account(bus, &outcome);
            return outcome;
        }
        self.controller.set_running();
        bus.publish(self.event(
            EventKind::WorkerStarted,
            json!({ "routine": routine, "account": account_id }),
        ));

        let templates = catalogs.templates.resolve(compiled.templates());
        let ctx = RunContext::new(
            self.instance_id.clone(),
            Arc::clone(&self.controller),
            self.device.clone(),
        )
        .with_account(account)
        .with_templates(templates);

        // Run on its own task so a panicking executor fails this run only.
        let task = tokio::spawn({
            let executor = executor.clone();
            async move { executor.run(compiled, ctx).await }
        });
        let outcome = match task.await {
            Ok(Ok(())) => RunOutcome::Completed,
            Ok(Err(ExecutorError::Interrupted)) => RunOutcome::Stopped,
            Ok(Err(e)) => RunOutcome::Failed(e.to_string()),
            Err(e) if e.is_panic() => RunOutcome::Failed("routine executor panicked".to_string()),
            Err(e) => RunOutcome::Failed(e.to_string()),
        };

        self.return_account(bus, &outcome);
        outcome
    }

    async fn checkout(
        &self,
        pool: &Arc<ResourcePool>,
        bus: &EventBus,
    ) -> Result<Account, RunOutcome> {
        match pool.checkout_until(self.controller.stopped()).await {
            Ok(account) => {
                *self.held.lock() = Some(HeldAccount {
                    pool: Arc::clone(pool),
                    account: account.id.clone(),
                });
                tracing::info!(instance_id = %self.instance_id, pool = pool.name(), account = %account.id, "account checked out");
                bus.publish(self.event(
                    EventKind::ResourceCheckedOut,
                    json!({ "pool": pool.name(), "account": account.id }),
                ));
                Ok(account)
            }
            Err(PoolError::Cancelled) => Err(RunOutcome::Stopped),
            Err(e) if e.is_retryable() => Err(RunOutcome::Exhausted(e.to_string())),
            Err(e) => Err(RunOutcome::Failed(e.to_string())),
        }
    }

    fn return_account(&self, bus: &EventBus, outcome: &RunOutcome) {
        let Some(held) = self.held.lock().take() else {
            return;
        };
        let ret = outcome.return_outcome();
        match held.pool.return_account(&held.account, ret.clone()) {
            Ok(state) => {
                bus.publish(self.event(
                    EventKind::ResourceReturned,
                    json!({
                        "pool": held.pool.name(),
                        "account": held.account,
                        "outcome": ret.name(),
                        "state": state.to_string(),
                    }),
                ));
            }
            Err(e) => {
                tracing::warn!(instance_id = %self.instance_id, account = %held.account, error = %e, "account return failed");
            }
        }
    }

    /// Hand back an account left behind by an aborted run.
    pub(crate) fn release_held(&self, bus: &EventBus) -> Option<AccountId> {
        let account = self.account()?;
        self.return_account(bus, &RunOutcome::Stopped);
        Some(account)
    }

    /// Record how a run ended: terminal controller state plus an event.
    pub fn settle(&self, bus: &EventBus, outcome: &RunOutcome) {
        let routine = self.last_routine();
        match outcome {
            RunOutcome::Completed => {
                self.controller.set_completed();
                let runs = self.completed_runs.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::info!(instance_id = %self.instance_id, runs, "run completed");
                bus.publish(self.event(
                    EventKind::WorkerCompleted,
                    json!({ "routine": routine, "runs": runs }),
                ));
            }
            RunOutcome::Stopped => {
                self.controller.force_stop();
                tracing::info!(instance_id = %self.instance_id, "run stopped");
                bus.publish(self.event(EventKind::WorkerStopped, json!({ "routine": routine })));
            }
            RunOutcome::Failed(reason) | RunOutcome::Exhausted(reason) => {
                self.controller.force_stop();
                tracing::warn!(instance_id = %self.instance_id, error = %reason, "run failed");
                bus.publish(self.event(
                    EventKind::WorkerFailed,
                    json!({ "routine": routine, "error": reason }),
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
