// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Fleet supervision engine

mod coordinator;
mod error;
mod event_bus;
mod registry;
mod restart;
mod worker;

pub use coordinator::{
    Coordinator, CoordinatorDeps, GroupSpec, GroupStatus, LaunchSpec, Repeat, ShutdownSummary,
    WorkerStatus,
};
pub use error::{CatalogError, CoordinatorError};
pub use event_bus::{BusConfig, EventBus, Handler, SubscriptionId};
pub use registry::{
    CatalogPaths, CatalogSet, Catalogs, Registry, ReloadSummary, RoutineCatalog, TemplateCatalog,
};
pub use restart::{RestartDecision, RestartPolicy, RestartTracker, SupervisionState};
pub use worker::{RunOutcome, Worker};
