// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for device automation and routine execution

pub mod device;
pub mod executor;
pub mod traced;

pub use device::{DeviceAdapter, DeviceError, DeviceHandle, NoOpDeviceAdapter};
pub use executor::{ExecutorError, RoutineExecutor, RunContext, ScriptedExecutor};
pub use traced::{TracedDevice, TracedExecutor};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use device::{DeviceCall, FakeDeviceAdapter};
#[cfg(any(test, feature = "test-support"))]
pub use executor::{ExecutorCall, FakeExecutor, FakeRun};
