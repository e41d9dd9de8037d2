// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake routine executor for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ExecutorError, RoutineExecutor, RunContext};
use async_trait::async_trait;
use fleet_core::{AccountId, InstanceId, Routine, RoutineName};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Scripted behavior for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeRun {
    /// Pass one checkpoint, then succeed.
    Succeed,
    /// Pass one checkpoint, then fail with the message.
    Fail(String),
    /// Pass `n` checkpoints with a short sleep between, then succeed.
    Checkpoints(u32),
    /// Keep checkpointing until told to stop.
    UntilStopped,
}

/// Recorded run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorCall {
    pub instance_id: InstanceId,
    pub routine: RoutineName,
    pub account: Option<AccountId>,
}

struct FakeExecutorState {
    script: VecDeque<FakeRun>,
    default: FakeRun,
    calls: Vec<ExecutorCall>,
    running: usize,
}

/// Fake executor that plays back a script of outcomes
#[derive(Clone)]
pub struct FakeExecutor {
    inner: Arc<Mutex<FakeExecutorState>>,
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self::new(FakeRun::Succeed)
    }
}

impl FakeExecutor {
    /// Executor whose every unscripted run behaves like `default`.
    pub fn new(default: FakeRun) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeExecutorState {
                script: VecDeque::new(),
                default,
                calls: Vec::new(),
                running: 0,
            })),
        }
    }

    /// Queue behaviors for the next runs, in order.
    pub fn script(&self, runs: impl IntoIterator<Item = FakeRun>) {
        self.inner.lock().script.extend(runs);
    }

    pub fn calls(&self) -> Vec<ExecutorCall> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    /// Runs currently in progress
    pub fn running(&self) -> usize {
        self.inner.lock().running
    }
}

struct RunningGuard(Arc<Mutex<FakeExecutorState>>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.lock().running -= 1;
    }
}

#[async_trait]
impl RoutineExecutor for FakeExecutor {
    async fn run(&self, routine: Arc<Routine>, ctx: RunContext) -> Result<(), ExecutorError> {
        let behavior = {
            let mut inner = self.inner.lock();
            inner.calls.push(ExecutorCall {
                instance_id: ctx.instance_id.clone(),
                routine: routine.name.clone(),
                account: ctx.account.as_ref().map(|a| a.id.clone()),
            });
            inner.running += 1;
            let default = inner.default.clone();
            inner.script.pop_front().unwrap_or(default)
        };
        let _guard = RunningGuard(Arc::clone(&self.inner));
        let controller = &ctx.controller;

        let checkpoints = match &behavior {
            FakeRun::Succeed | FakeRun::Fail(_) => Some(1),
            FakeRun::Checkpoints(n) => Some(*n),
            FakeRun::UntilStopped => None,
        };

        let mut passed = 0u32;
        while checkpoints.map_or(true, |n| passed < n) {
            if !controller.check_pause_or_stop().await {
                return Err(ExecutorError::Interrupted);
            }
            passed += 1;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        match behavior {
            FakeRun::Fail(message) => Err(ExecutorError::Step {
                step: "fake".to_string(),
                message,
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
