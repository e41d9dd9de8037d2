// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step-by-step executor that forwards each step's command to the device.

use super::{ExecutorError, RoutineExecutor, RunContext};
use crate::device::DeviceAdapter;
use async_trait::async_trait;
use fleet_core::Routine;
use std::sync::Arc;

/// Walks a routine's steps in order.
///
/// Checkpoints run before every step and after every step delay; the delay
/// itself is cut short by a stop request.
#[derive(Clone)]
pub struct ScriptedExecutor<D> {
    device: D,
}

impl<D: DeviceAdapter> ScriptedExecutor<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }
}

#[async_trait]
impl<D: DeviceAdapter> RoutineExecutor for ScriptedExecutor<D> {
    async fn run(&self, routine: Arc<Routine>, ctx: RunContext) -> Result<(), ExecutorError> {
        let controller = &ctx.controller;
        for step in &routine.steps {
            if !controller.check_pause_or_stop().await {
                return Err(ExecutorError::Interrupted);
            }

            if let Some(template) = &step.template {
                if !ctx.templates.contains_key(template) {
                    return Err(ExecutorError::Step {
                        step: step.name.clone(),
                        message: format!("template '{}' not loaded", template),
                    });
                }
            }

            if let Some(command) = &step.command {
                let command = ctx.interpolate(command);
                tracing::debug!(instance_id = %ctx.instance_id, step = %step.name, %command, "step");
                self.device
                    .send(&ctx.device, &command)
                    .await
                    .map_err(|e| ExecutorError::Step {
                        step: step.name.clone(),
                        message: e.to_string(),
                    })?;
            }

            if !step.delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(step.delay) => {}
                    _ = controller.stopped() => return Err(ExecutorError::Interrupted),
                }
            }
        }

        if controller.check_pause_or_stop().await {
            Ok(())
        } else {
            Err(ExecutorError::Interrupted)
        }
    }
}

#[cfg(test)]
#[path = "scripted_tests.rs"]
mod tests;
