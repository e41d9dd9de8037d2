// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-pool: shared pool of finite-use accounts

mod config;
mod error;
mod policy;
mod pool;
mod source;
mod watch;

pub use config::{PoolConfig, WaitPolicy};
pub use error::{PoolError, SourceError};
pub use policy::{Filter, SelectionPolicy, SortField, SortKey, SortOrder};
pub use pool::{PoolStats, RefreshSummary, ResourcePool};
pub use source::{AccountSource, DirectorySource, SourceSnapshot, StaticSource};
