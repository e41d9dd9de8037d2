// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use fleet_adapters::DeviceError;
use fleet_core::{ExecutionState, GroupName, InstanceId, RoutineName};
use fleet_pool::PoolError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by coordinator operations
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("instance not found: {0}")]
    NotFound(InstanceId),
    #[error("cannot {op} instance {instance} while {state}")]
    InvalidTransition {
        instance: InstanceId,
        op: &'static str,
        state: ExecutionState,
    },
    #[error("instance {0} has no routine to restart")]
    NoLastRoutine(InstanceId),
    #[error("instance {0} is already running")]
    InstanceBusy(InstanceId),
    #[error("coordinator is shutting down")]
    ShuttingDown,
    #[error("group not found: {0}")]
    GroupNotFound(GroupName),
    #[error("group {0} is already running")]
    GroupExists(GroupName),
    #[error("routine not found: {0}")]
    RoutineNotFound(RoutineName),
    #[error("invalid launch: {0}")]
    InvalidLaunch(String),
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Errors loading routine or template catalogs
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid routine file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("duplicate routine '{name}' in {}", path.display())]
    Duplicate { name: RoutineName, path: PathBuf },
}
