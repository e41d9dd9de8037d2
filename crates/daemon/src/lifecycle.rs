// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, reload, shutdown.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use fleet_adapters::{NoOpDeviceAdapter, ScriptedExecutor, TracedDevice, TracedExecutor};
use fleet_core::{Event, GroupName};
use fleet_engine::{
    CatalogError, Catalogs, Coordinator, CoordinatorDeps, CoordinatorError, EventBus,
    ShutdownSummary, SubscriptionId,
};
use fleet_pool::{DirectorySource, PoolError, ResourcePool};
use fs2::FileExt;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, DaemonConfig};

/// Device adapter the daemon drives (wrapped with tracing)
pub type DaemonDevice = TracedDevice<NoOpDeviceAdapter>;

/// Routine executor the daemon runs (wrapped with tracing)
pub type DaemonExecutor = TracedExecutor<ScriptedExecutor<DaemonDevice>>;

pub type DaemonCoordinator = Coordinator<DaemonExecutor, DaemonDevice>;

/// Target for the structured event log.
pub const EVENT_LOG_TARGET: &str = "fleet::events";

/// Files the daemon keeps under its state directory
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root state directory (e.g. ~/.local/state/fleet)
    pub state_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
}

impl Paths {
    pub fn under(state_dir: PathBuf) -> Self {
        Self {
            lock_path: state_dir.join("fleetd.pid"),
            log_path: state_dir.join("fleetd.log"),
            state_dir,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A running daemon.
pub struct Daemon {
    paths: Paths,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub coordinator: DaemonCoordinator,
    pub pools: BTreeMap<String, Arc<ResourcePool>>,
    pub groups: Vec<GroupName>,
    pub start_time: Instant,
}

/// Record every bus event as a structured log line.
pub fn attach_event_log(bus: &EventBus) -> SubscriptionId {
    bus.subscribe_all(|event: &Event| {
        if event.kind.is_failure() {
            warn!(
                target: EVENT_LOG_TARGET,
                kind = %event.kind,
                source = %event.source,
                data = %event.data,
                "event"
            );
        } else {
            info!(
                target: EVENT_LOG_TARGET,
                kind = %event.kind,
                source = %event.source,
                data = %event.data,
                "event"
            );
        }
    })
}

/// Start the daemon
pub async fn startup(config: &DaemonConfig, paths: &Paths) -> Result<Daemon, LifecycleError> {
    std::fs::create_dir_all(&paths.state_dir)?;
    let lock_file = acquire_lock(paths)?;

    match startup_inner(config).await {
        Ok((coordinator, pools, groups)) => Ok(Daemon {
            paths: paths.clone(),
            lock_file,
            coordinator,
            pools,
            groups,
            start_time: Instant::now(),
        }),
        Err(e) => {
            // The lock is ours, so the PID file is too.
            remove_pid_file(paths);
            Err(e)
        }
    }
}

/// Take the single-instance lock and record our PID in it.
fn acquire_lock(paths: &Paths) -> Result<File, LifecycleError> {
    use std::io::Write;

    // Open without truncating: until we hold the lock, the PID inside
    // belongs to whichever daemon does.
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

async fn startup_inner(
    config: &DaemonConfig,
) -> Result<
    (
        DaemonCoordinator,
        BTreeMap<String, Arc<ResourcePool>>,
        Vec<GroupName>,
    ),
    LifecycleError,
> {
    config.validate()?;

    let bus = EventBus::new(config.bus);
    attach_event_log(&bus);

    let catalogs = Arc::new(Catalogs::load(config.catalogs.clone())?);
    info!(
        routines = catalogs.routines().len(),
        templates = catalogs.templates().len(),
        "catalogs loaded"
    );

    let mut pools = BTreeMap::new();
    for section in &config.pools {
        let source = DirectorySource::new(section.accounts_dir.clone());
        let pool = Arc::new(ResourcePool::new(section.config.clone(), source)?);
        if section.watch {
            pool.watch_source()?;
        }
        info!(
            pool = %pool.name(),
            accounts = pool.stats().total,
            dir = %section.accounts_dir.display(),
            "pool ready"
        );
        pools.insert(section.config.name.clone(), pool);
    }

    let device = TracedDevice::new(NoOpDeviceAdapter::new());
    let coordinator = Coordinator::new(CoordinatorDeps {
        executor: TracedExecutor::new(ScriptedExecutor::new(device.clone())),
        device,
        bus,
        catalogs,
    });

    let mut groups = Vec::with_capacity(config.groups.len());
    for section in &config.groups {
        let launched = match section.to_spec(&pools) {
            Ok(spec) => coordinator.launch_group(spec).await.map_err(LifecycleError::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = launched {
            warn!(group = %section.name, error = %e, "group launch failed, unwinding startup");
            wind_down(&coordinator, &pools).await;
            return Err(e);
        }
        groups.push(section.name.clone());
    }

    Ok((coordinator, pools, groups))
}

/// Stop every worker, close every pool, then drain the bus.
async fn wind_down(
    coordinator: &DaemonCoordinator,
    pools: &BTreeMap<String, Arc<ResourcePool>>,
) -> ShutdownSummary {
    let summary = coordinator.shutdown_all().await;
    for pool in pools.values() {
        coordinator.close_pool(pool);
    }
    coordinator.bus().stop().await;
    summary
}

fn remove_pid_file(paths: &Paths) {
    if paths.lock_path.exists() {
        if let Err(e) = std::fs::remove_file(&paths.lock_path) {
            warn!("Failed to remove PID file: {}", e);
        }
    }
}

impl Daemon {
    /// Re-read catalogs and refresh every pool from its source.
    pub fn reload(&self) {
        match self.coordinator.reload_catalogs() {
            Ok(summary) => info!(
                routines = summary.routines,
                templates = summary.templates,
                "reload: catalogs swapped"
            ),
            Err(e) => warn!(error = %e, "reload: catalogs kept, reload failed"),
        }
        for pool in self.pools.values() {
            if let Err(e) = self.coordinator.refresh_pool(pool) {
                warn!(pool = %pool.name(), error = %e, "reload: pool refresh failed");
            }
        }
    }

    /// Shutdown the daemon gracefully.
    ///
    /// Workers are stopped and awaited before pools close, so every held
    /// account is returned first. The bus drains last so shutdown events
    /// still reach the log.
    pub async fn shutdown(self) -> ShutdownSummary {
        info!("Shutting down daemon...");
        let summary = wind_down(&self.coordinator, &self.pools).await;

        let bus = self.coordinator.bus();
        info!(
            workers = summary.workers,
            accounts_released = summary.accounts_released,
            events_published = bus.published_count(),
            events_delivered = bus.delivered_count(),
            events_dropped = bus.dropped_count(),
            handler_panics = bus.handler_panics(),
            uptime_secs = self.start_time.elapsed().as_secs(),
            "Daemon shutdown complete"
        );

        // Lock file is released when self.lock_file is dropped
        remove_pid_file(&self.paths);
        summary
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
