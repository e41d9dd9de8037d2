// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::device::{DeviceAdapter, DeviceError, DeviceHandle};
use crate::executor::{ExecutorError, RoutineExecutor, RunContext};
use async_trait::async_trait;
use fleet_core::{InstanceId, Routine};
use std::sync::Arc;
use tracing::Instrument;

/// Wrapper that adds tracing to any DeviceAdapter
#[derive(Clone)]
pub struct TracedDevice<D> {
    inner: D,
}

impl<D> TracedDevice<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<D: DeviceAdapter> DeviceAdapter for TracedDevice<D> {
    async fn acquire(&self, instance_id: &InstanceId) -> Result<DeviceHandle, DeviceError> {
        async {
            tracing::info!("starting");
            let start = std::time::Instant::now();
            let result = self.inner.acquire(instance_id).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(h) => tracing::info!(serial = %h.serial, elapsed_ms, "device acquired"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "acquire failed"),
            }
            result
        }
        .instrument(tracing::info_span!("device.acquire", %instance_id))
        .await
    }

    async fn release(&self, handle: &DeviceHandle) -> Result<(), DeviceError> {
        let result = self.inner.release(handle).await;
        tracing::info_span!("device.release", instance_id = %handle.instance_id).in_scope(
            || match &result {
                Ok(()) => tracing::info!("released"),
                Err(e) => tracing::warn!(error = %e, "release failed"),
            },
        );
        result
    }

    async fn send(&self, handle: &DeviceHandle, command: &str) -> Result<(), DeviceError> {
        tracing::debug_span!("device.send", instance_id = %handle.instance_id)
            .in_scope(|| tracing::trace!(command, "sending"));
        let result = self.inner.send(handle, command).await;
        if let Err(ref e) = result {
            tracing::error!(instance_id = %handle.instance_id, error = %e, "send failed");
        }
        result
    }
}

/// Wrapper that adds tracing to any RoutineExecutor
#[derive(Clone)]
pub struct TracedExecutor<E> {
    inner: E,
}

impl<E> TracedExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<E: RoutineExecutor> RoutineExecutor for TracedExecutor<E> {
    async fn run(&self, routine: Arc<Routine>, ctx: RunContext) -> Result<(), ExecutorError> {
        let span = tracing::info_span!(
            "executor.run",
            instance_id = %ctx.instance_id,
            routine = %routine.name,
            account = ctx.account.as_ref().map(|a| a.id.as_str()).unwrap_or("-"),
        );
        async {
            tracing::info!(steps = routine.steps.len(), "starting");
            let start = std::time::Instant::now();
            let result = self.inner.run(routine, ctx).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => tracing::info!(elapsed_ms, "routine completed"),
                Err(ExecutorError::Interrupted) => tracing::info!(elapsed_ms, "routine interrupted"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "routine failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
