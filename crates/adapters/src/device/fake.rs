// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake device adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{DeviceAdapter, DeviceError, DeviceHandle};
use async_trait::async_trait;
use fleet_core::InstanceId;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Recorded device call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Acquire { instance_id: InstanceId },
    Release { instance_id: InstanceId },
    Send { instance_id: InstanceId, command: String },
}

#[derive(Default)]
struct FakeDeviceState {
    calls: Vec<DeviceCall>,
    attached: HashSet<InstanceId>,
    unavailable: HashSet<InstanceId>,
    acquire_delay: Option<Duration>,
}

/// Fake device adapter for testing
#[derive(Clone, Default)]
pub struct FakeDeviceAdapter {
    inner: Arc<Mutex<FakeDeviceState>>,
}

impl FakeDeviceAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `acquire` fail for this instance.
    pub fn set_unavailable(&self, instance_id: &InstanceId) {
        self.inner.lock().unavailable.insert(instance_id.clone());
    }

    /// Make every `acquire` take this long before attaching.
    pub fn set_acquire_delay(&self, delay: Duration) {
        self.inner.lock().acquire_delay = Some(delay);
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.inner.lock().calls.clone()
    }

    /// Commands sent to one instance, in order
    pub fn commands(&self, instance_id: &InstanceId) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::Send {
                    instance_id: id,
                    command,
                } if id == instance_id => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    /// Instances currently acquired and not yet released
    pub fn attached(&self) -> usize {
        self.inner.lock().attached.len()
    }
}

#[async_trait]
impl DeviceAdapter for FakeDeviceAdapter {
    async fn acquire(&self, instance_id: &InstanceId) -> Result<DeviceHandle, DeviceError> {
        let delay = self.inner.lock().acquire_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.inner.lock();
        inner.calls.push(DeviceCall::Acquire {
            instance_id: instance_id.clone(),
        });
        if inner.unavailable.contains(instance_id) {
            return Err(DeviceError::Unavailable(instance_id.to_string()));
        }
        inner.attached.insert(instance_id.clone());
        Ok(DeviceHandle::new(instance_id.clone(), format!("fake-{}", instance_id)))
    }

    async fn release(&self, handle: &DeviceHandle) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DeviceCall::Release {
            instance_id: handle.instance_id.clone(),
        });
        inner.attached.remove(&handle.instance_id);
        Ok(())
    }

    async fn send(&self, handle: &DeviceHandle, command: &str) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DeviceCall::Send {
            instance_id: handle.instance_id.clone(),
            command: command.to_string(),
        });
        if command.starts_with("fail") {
            return Err(DeviceError::CommandFailed(command.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
