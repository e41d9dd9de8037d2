// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routine executor adapters
//!
//! An executor walks a routine against one device. It must call
//! [`ExecutionController::check_pause_or_stop`] between steps and return
//! promptly (with [`ExecutorError::Interrupted`]) once that returns `false`.

mod scripted;

pub use scripted::ScriptedExecutor;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ExecutorCall, FakeExecutor, FakeRun};

use crate::device::{DeviceError, DeviceHandle};
use async_trait::async_trait;
use fleet_core::{Account, ExecutionController, InstanceId, Routine};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors from running a routine
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// The controller asked the executor to unwind.
    #[error("interrupted by stop request")]
    Interrupted,
    #[error("step '{step}' failed: {message}")]
    Step { step: String, message: String },
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

/// Everything an executor gets for one run.
#[derive(Clone)]
pub struct RunContext {
    pub instance_id: InstanceId,
    pub controller: Arc<ExecutionController>,
    pub device: DeviceHandle,
    /// Account checked out for this run, if the launch uses a pool.
    pub account: Option<Account>,
    /// Template files the routine references, resolved by name.
    pub templates: HashMap<String, PathBuf>,
}

impl RunContext {
    pub fn new(
        instance_id: InstanceId,
        controller: Arc<ExecutionController>,
        device: DeviceHandle,
    ) -> Self {
        Self {
            instance_id,
            controller,
            device,
            account: None,
            templates: HashMap::new(),
        }
    }

    pub fn with_account(mut self, account: Option<Account>) -> Self {
        self.account = account;
        self
    }

    pub fn with_templates(mut self, templates: HashMap<String, PathBuf>) -> Self {
        self.templates = templates;
        self
    }

    /// Expand `{instance}`, `{account}` and `{serial}` in a step command.
    pub fn interpolate(&self, command: &str) -> String {
        let account = self.account.as_ref().map(|a| a.id.as_str()).unwrap_or("");
        command
            .replace("{instance}", self.instance_id.as_str())
            .replace("{account}", account)
            .replace("{serial}", &self.device.serial)
    }
}

/// Adapter that runs routines
#[async_trait]
pub trait RoutineExecutor: Clone + Send + Sync + 'static {
    /// Run `routine` to completion, error, or interruption
    async fn run(&self, routine: Arc<Routine>, ctx: RunContext) -> Result<(), ExecutorError>;
}
