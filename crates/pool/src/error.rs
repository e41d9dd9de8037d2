// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the resource pool

use fleet_core::AccountId;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading accounts out of an upstream source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid account file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Errors returned by pool operations
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no eligible account available")]
    ResourceExhausted,
    #[error("timed out after {0:?} waiting for an account")]
    Timeout(Duration),
    #[error("pool is closed")]
    PoolClosed,
    #[error("checkout cancelled")]
    Cancelled,
    #[error("unknown account: {0}")]
    UnknownAccount(AccountId),
    #[error("account {0} is not checked out")]
    NotInUse(AccountId),
    #[error("account {0} is checked out")]
    InUse(AccountId),
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("watch error: {0}")]
    Watch(String),
}

impl PoolError {
    /// Errors a caller may resolve by waiting and trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::ResourceExhausted | PoolError::Timeout(_))
    }
}
