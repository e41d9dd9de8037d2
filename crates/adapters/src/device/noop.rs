// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op device adapter for dry runs.

use super::{DeviceAdapter, DeviceError, DeviceHandle};
use async_trait::async_trait;
use fleet_core::InstanceId;

/// Device adapter that accepts every command and does nothing.
///
/// Used for dry runs and deployments where the transport lives elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpDeviceAdapter;

impl NoOpDeviceAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeviceAdapter for NoOpDeviceAdapter {
    async fn acquire(&self, instance_id: &InstanceId) -> Result<DeviceHandle, DeviceError> {
        Ok(DeviceHandle::new(instance_id.clone(), "noop"))
    }

    async fn release(&self, _handle: &DeviceHandle) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn send(&self, _handle: &DeviceHandle, _command: &str) -> Result<(), DeviceError> {
        Ok(())
    }
}
