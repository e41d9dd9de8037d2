// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator: creates workers and supervises their launches.
//!
//! Each slot (instance id) has at most one supervision task. The task runs
//! the launch's routine, applies the restart policy on failure, and exits
//! when the launch is done, gives up, or is stopped. Control calls reach a
//! worker only through its controller and the slot's halt flag.

mod groups;
mod status;
mod supervise;

pub use groups::GroupSpec;
pub use status::{GroupStatus, WorkerStatus};

use crate::error::CoordinatorError;
use crate::event_bus::EventBus;
use crate::registry::{Catalogs, ReloadSummary};
use crate::restart::{RestartPolicy, SupervisionState};
use crate::worker::Worker;
use fleet_adapters::{DeviceAdapter, DeviceHandle, RoutineExecutor};
use fleet_core::{Event, EventKind, ExecutionState, GroupName, InstanceId, RoutineName};
use fleet_pool::{RefreshSummary, ResourcePool};
use groups::Group;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How many successful runs a launch performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Repeat {
    #[default]
    Once,
    Times(u32),
    /// Keep running until the pool has no account to give.
    UntilExhausted,
}

impl Repeat {
    /// Whether another run follows `completed` successful ones.
    pub fn again(self, completed: u32) -> bool {
        match self {
            Repeat::Once => false,
            Repeat::Times(n) => completed < n,
            Repeat::UntilExhausted => true,
        }
    }
}

/// What to run on a slot, and how to supervise it.
#[derive(Clone)]
pub struct LaunchSpec {
    pub routine: RoutineName,
    pub pool: Option<Arc<ResourcePool>>,
    pub restart: RestartPolicy,
    pub repeat: Repeat,
}

impl std::fmt::Debug for LaunchSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchSpec")
            .field("routine", &self.routine)
            .field("pool", &self.pool.as_ref().map(|p| p.name()))
            .field("restart", &self.restart)
            .field("repeat", &self.repeat)
            .finish()
    }
}

impl LaunchSpec {
    pub fn new(routine: impl Into<RoutineName>) -> Self {
        Self {
            routine: routine.into(),
            pool: None,
            restart: RestartPolicy::default(),
            repeat: Repeat::Once,
        }
    }

    pub fn pool(mut self, pool: Arc<ResourcePool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn restart(mut self, policy: RestartPolicy) -> Self {
        self.restart = policy;
        self
    }

    pub fn repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }
}

/// Coordinator adapter dependencies
pub struct CoordinatorDeps<E, D> {
    pub executor: E,
    pub device: D,
    pub bus: EventBus,
    pub catalogs: Arc<Catalogs>,
}

/// Counts from a completed shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    pub workers: usize,
    /// Accounts handed back by the shutdown sweep rather than by the
    /// worker's own run.
    pub accounts_released: usize,
}

pub(crate) struct Slot {
    worker: Arc<Worker>,
    group: Mutex<Option<GroupName>>,
    halt: watch::Sender<bool>,
    active: AtomicBool,
    supervision: Mutex<SupervisionState>,
    failures: AtomicU32,
    last_launch: Mutex<Option<LaunchSpec>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Slot {
    fn new(worker: Arc<Worker>) -> Self {
        Self {
            worker,
            group: Mutex::new(None),
            halt: watch::Sender::new(false),
            active: AtomicBool::new(false),
            supervision: Mutex::new(SupervisionState::Idle),
            failures: AtomicU32::new(0),
            last_launch: Mutex::new(None),
            task: tokio::sync::Mutex::new(None),
        }
    }

    fn is_halted(&self) -> bool {
        *self.halt.borrow()
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Ask the supervision task and the current run to wind down.
    fn halt(&self) {
        // The flag goes first: the supervisor resets the controller before
        // reading it, so a stop can never be lost between runs.
        self.halt.send_replace(true);
        self.worker.controller().force_stop();
    }

    fn set_supervision(&self, state: SupervisionState, failures: u32) {
        *self.supervision.lock() = state;
        self.failures.store(failures, Ordering::SeqCst);
    }
}

struct Shared<E, D> {
    executor: E,
    device: D,
    bus: EventBus,
    catalogs: Arc<Catalogs>,
    slots: RwLock<BTreeMap<InstanceId, Arc<Slot>>>,
    groups: RwLock<BTreeMap<GroupName, Group>>,
    shutting_down: AtomicBool,
}

/// Supervises every worker slot. Cheap to clone.
pub struct Coordinator<E, D> {
    shared: Arc<Shared<E, D>>,
}

impl<E, D> Clone for Coordinator<E, D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E, D> Coordinator<E, D>
where
    E: RoutineExecutor,
    D: DeviceAdapter,
{
    pub fn new(deps: CoordinatorDeps<E, D>) -> Self {
        Self {
            shared: Arc::new(Shared {
                executor: deps.executor,
                device: deps.device,
                bus: deps.bus,
                catalogs: deps.catalogs,
                slots: RwLock::new(BTreeMap::new()),
                groups: RwLock::new(BTreeMap::new()),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    pub fn catalogs(&self) -> &Arc<Catalogs> {
        &self.shared.catalogs
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutting_down.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<(), CoordinatorError> {
        if self.is_shutting_down() {
            Err(CoordinatorError::ShuttingDown)
        } else {
            Ok(())
        }
    }

    fn slot(&self, id: &InstanceId) -> Result<Arc<Slot>, CoordinatorError> {
        self.shared
            .slots
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| CoordinatorError::NotFound(id.clone()))
    }

    fn publish(&self, kind: EventKind, source: &str, data: serde_json::Value) {
        self.shared.bus.publish(Event::new(kind, source).with_data(data));
    }

    pub fn worker(&self, id: &InstanceId) -> Option<Arc<Worker>> {
        self.shared
            .slots
            .read()
            .get(id)
            .map(|s| Arc::clone(&s.worker))
    }

    /// Allocate the worker for a slot, acquiring its device.
    ///
    /// Returns the existing worker if the slot already has one. Every
    /// worker shares the coordinator's catalogs.
    pub async fn create_worker(&self, id: &InstanceId) -> Result<Arc<Worker>, CoordinatorError> {
        self.ensure_running()?;
        if let Some(worker) = self.worker(id) {
            return Ok(worker);
        }

        let device = self.shared.device.acquire(id).await?;
        // Decided under the slot lock, which `shutdown_all` also takes to
        // raise its flag: a slot is either in its snapshot or refused here.
        let placed = {
            let mut slots = self.shared.slots.write();
            if self.is_shutting_down() {
                Err((device, CoordinatorError::ShuttingDown))
            } else if let Some(slot) = slots.get(id) {
                // Lost a race with a concurrent create for the same slot.
                let worker = Arc::clone(&slot.worker);
                Ok((worker, Some(device)))
            } else {
                let worker = Arc::new(Worker::new(
                    id.clone(),
                    device,
                    Arc::clone(&self.shared.catalogs),
                ));
                slots.insert(id.clone(), Arc::new(Slot::new(Arc::clone(&worker))));
                Ok((worker, None))
            }
        };

        let worker = match placed {
            Ok((worker, None)) => worker,
            Ok((worker, Some(device))) => {
                self.release_device(id, &device).await;
                return Ok(worker);
            }
            Err((device, e)) => {
                self.release_device(id, &device).await;
                return Err(e);
            }
        };

        tracing::info!(instance_id = %id, serial = %worker.device().serial, "worker created");
        self.publish(
            EventKind::WorkerCreated,
            id.as_str(),
            json!({ "serial": worker.device().serial }),
        );
        Ok(worker)
    }

    async fn release_device(&self, id: &InstanceId, device: &DeviceHandle) {
        if let Err(e) = self.shared.device.release(device).await {
            tracing::warn!(instance_id = %id, error = %e, "device release failed");
        }
    }

    fn validate(&self, spec: &LaunchSpec) -> Result<(), CoordinatorError> {
        if !self.shared.catalogs.routines().contains(spec.routine.as_str()) {
            return Err(CoordinatorError::RoutineNotFound(spec.routine.clone()));
        }
        if spec.repeat == Repeat::UntilExhausted && spec.pool.is_none() {
            return Err(CoordinatorError::InvalidLaunch(
                "until-exhausted needs a pool".to_string(),
            ));
        }
        Ok(())
    }

    /// Start running `spec` on a slot under supervision.
    pub async fn launch(&self, id: &InstanceId, spec: LaunchSpec) -> Result<(), CoordinatorError> {
        self.ensure_running()?;
        self.validate(&spec)?;
        self.create_worker(id).await?;
        let slot = self.slot(id)?;
        self.start(&slot, spec).await
    }

    async fn start(&self, slot: &Arc<Slot>, spec: LaunchSpec) -> Result<(), CoordinatorError> {
        let mut task = slot.task.lock().await;
        self.ensure_running()?;
        if slot.is_active() {
            return Err(CoordinatorError::InstanceBusy(
                slot.worker.instance_id().clone(),
            ));
        }

        slot.halt.send_replace(false);
        // A shutdown that raised its flag after the check above may already
        // have halted this slot; put the halt back and refuse.
        if self.is_shutting_down() {
            slot.halt.send_replace(true);
            return Err(CoordinatorError::ShuttingDown);
        }
        slot.active.store(true, Ordering::SeqCst);
        slot.set_supervision(SupervisionState::Healthy, 0);
        *slot.last_launch.lock() = Some(spec.clone());

        tracing::info!(
            instance_id = %slot.worker.instance_id(),
            routine = %spec.routine,
            pool = spec.pool.as_ref().map(|p| p.name()).unwrap_or("-"),
            restart = spec.restart.enabled,
            "launching"
        );
        *task = Some(tokio::spawn(supervise::supervise(
            self.shared.executor.clone(),
            self.shared.bus.clone(),
            Arc::clone(slot),
            spec,
        )));
        Ok(())
    }

    /// Wait for the slot's supervision task to exit.
    async fn join(&self, slot: &Slot) {
        let mut task = slot.task.lock().await;
        Self::await_task(slot, task.take()).await;
    }

    /// Halt a slot and wait for its supervision task to exit.
    ///
    /// The halt is repeated under the task lock: a launch that slipped in
    /// after the first halt has spawned by then and is stopped too.
    async fn halt_and_join(&self, slot: &Slot) {
        slot.halt();
        let mut task = slot.task.lock().await;
        slot.halt();
        Self::await_task(slot, task.take()).await;
    }

    async fn await_task(slot: &Slot, handle: Option<JoinHandle<()>>) {
        let Some(handle) = handle else {
            return;
        };
        if let Err(e) = handle.await {
            tracing::error!(instance_id = %slot.worker.instance_id(), error = %e, "supervision task failed");
            slot.active.store(false, Ordering::SeqCst);
        }
    }

    /// Wait until the slot's current launch has ended.
    pub async fn wait(&self, id: &InstanceId) -> Result<(), CoordinatorError> {
        let slot = self.slot(id)?;
        self.join(&slot).await;
        Ok(())
    }

    pub fn pause(&self, id: &InstanceId) -> Result<(), CoordinatorError> {
        let slot = self.slot(id)?;
        let controller = slot.worker.controller();
        if !controller.pause() {
            return Err(CoordinatorError::InvalidTransition {
                instance: id.clone(),
                op: "pause",
                state: controller.state(),
            });
        }
        tracing::info!(instance_id = %id, "paused");
        self.publish(EventKind::WorkerPaused, id.as_str(), serde_json::Value::Null);
        Ok(())
    }

    pub fn resume(&self, id: &InstanceId) -> Result<(), CoordinatorError> {
        let slot = self.slot(id)?;
        let controller = slot.worker.controller();
        if !controller.resume() {
            return Err(CoordinatorError::InvalidTransition {
                instance: id.clone(),
                op: "resume",
                state: controller.state(),
            });
        }
        tracing::info!(instance_id = %id, "resumed");
        self.publish(EventKind::WorkerResumed, id.as_str(), serde_json::Value::Null);
        Ok(())
    }

    /// Stop the slot's run and cancel any pending restart. Idempotent;
    /// does not wait (see [`Coordinator::wait`]).
    pub fn stop(&self, id: &InstanceId) -> Result<(), CoordinatorError> {
        let slot = self.slot(id)?;
        slot.halt();
        tracing::info!(instance_id = %id, "stop requested");
        Ok(())
    }

    /// Relaunch the slot's most recent launch, stopping the current one
    /// first if it is still running.
    pub async fn restart(&self, id: &InstanceId) -> Result<(), CoordinatorError> {
        self.ensure_running()?;
        let slot = self.slot(id)?;
        let spec = slot
            .last_launch
            .lock()
            .clone()
            .ok_or_else(|| CoordinatorError::NoLastRoutine(id.clone()))?;

        if slot.is_active() {
            self.halt_and_join(&slot).await;
        }
        tracing::info!(instance_id = %id, routine = %spec.routine, "restarting");
        self.start(&slot, spec).await
    }

    /// Stop a slot, wait for it, release its device and forget it.
    pub async fn remove_worker(&self, id: &InstanceId) -> Result<(), CoordinatorError> {
        let slot = self.slot(id)?;
        self.halt_and_join(&slot).await;
        slot.worker.release_held(&self.shared.bus);
        self.release_device(id, slot.worker.device()).await;

        self.shared.slots.write().remove(id);
        for group in self.shared.groups.write().values_mut() {
            group.members.retain(|m| m != id);
        }
        tracing::info!(instance_id = %id, "worker removed");
        self.publish(EventKind::WorkerRemoved, id.as_str(), serde_json::Value::Null);
        Ok(())
    }

    /// Stop every slot and wait until all of them have exited.
    ///
    /// Accounts still held afterwards are returned to their pools and
    /// devices are released. New launches are refused from here on.
    pub async fn shutdown_all(&self) -> ShutdownSummary {
        let slots: Vec<Arc<Slot>> = {
            let slots = self.shared.slots.write();
            self.shared.shutting_down.store(true, Ordering::SeqCst);
            slots.values().cloned().collect()
        };
        tracing::info!(workers = slots.len(), "shutting down all workers");

        for slot in &slots {
            slot.halt();
        }
        for slot in &slots {
            self.halt_and_join(slot).await;
        }

        let mut summary = ShutdownSummary {
            workers: slots.len(),
            accounts_released: 0,
        };
        for slot in &slots {
            if slot.worker.release_held(&self.shared.bus).is_some() {
                summary.accounts_released += 1;
            }
            self.release_device(slot.worker.instance_id(), slot.worker.device())
                .await;
        }
        tracing::info!(
            workers = summary.workers,
            accounts_released = summary.accounts_released,
            "shutdown complete"
        );
        summary
    }

    /// Re-read the catalogs from disk and swap them in.
    ///
    /// Running workers keep the snapshot they started with; the next run
    /// sees the new one.
    pub fn reload_catalogs(&self) -> Result<ReloadSummary, CoordinatorError> {
        let summary = self.shared.catalogs.reload()?;
        self.publish(
            EventKind::RegistryReloaded,
            "coordinator",
            json!({ "routines": summary.routines, "templates": summary.templates }),
        );
        Ok(summary)
    }

    /// Refresh a pool from its source and announce it.
    pub fn refresh_pool(&self, pool: &ResourcePool) -> Result<RefreshSummary, CoordinatorError> {
        let summary = pool.refresh()?;
        self.publish(
            EventKind::PoolRefreshed,
            pool.name(),
            json!({
                "added": summary.added.len(),
                "removed": summary.removed.len(),
                "total": summary.total,
            }),
        );
        Ok(summary)
    }

    /// Close a pool and announce it.
    pub fn close_pool(&self, pool: &ResourcePool) {
        pool.close();
        self.publish(EventKind::PoolClosed, pool.name(), json!(pool.stats()));
    }

    pub fn state(&self, id: &InstanceId) -> Option<ExecutionState> {
        self.worker(id).map(|w| w.controller().state())
    }
}

#[cfg(test)]
#[path = "../coordinator_tests/mod.rs"]
mod tests;
