// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device automation adapters
//!
//! The fleet only manages a device handle's lifecycle (acquire when a
//! worker is created, release on teardown) and forwards step commands.

mod noop;

pub use noop::NoOpDeviceAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{DeviceCall, FakeDeviceAdapter};

use async_trait::async_trait;
use fleet_core::InstanceId;
use thiserror::Error;

/// Errors from device operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("device unavailable: {0}")]
    Unavailable(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// Opaque handle to one emulated instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub instance_id: InstanceId,
    /// Transport-specific address (emulator serial, socket, ...).
    pub serial: String,
}

impl DeviceHandle {
    pub fn new(instance_id: InstanceId, serial: impl Into<String>) -> Self {
        Self {
            instance_id,
            serial: serial.into(),
        }
    }
}

/// Adapter for the device automation transport
#[async_trait]
pub trait DeviceAdapter: Clone + Send + Sync + 'static {
    /// Attach to the instance backing a worker slot
    async fn acquire(&self, instance_id: &InstanceId) -> Result<DeviceHandle, DeviceError>;

    /// Detach from the instance
    async fn release(&self, handle: &DeviceHandle) -> Result<(), DeviceError>;

    /// Issue one command to the instance
    async fn send(&self, handle: &DeviceHandle, command: &str) -> Result<(), DeviceError>;
}
