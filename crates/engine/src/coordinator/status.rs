// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only status queries.

use super::{Coordinator, Slot};
use crate::error::CoordinatorError;
use crate::restart::SupervisionState;
use fleet_adapters::{DeviceAdapter, RoutineExecutor};
use fleet_core::{AccountId, ExecutionState, GroupName, InstanceId, RoutineName};
use fleet_pool::PoolStats;
use serde::Serialize;
use std::sync::atomic::Ordering;

/// Snapshot of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub instance_id: InstanceId,
    pub group: Option<GroupName>,
    pub state: ExecutionState,
    pub supervision: SupervisionState,
    /// A supervision task is running for this slot.
    pub active: bool,
    /// Consecutive failed runs in the current launch.
    pub failures: u32,
    pub completed_runs: u32,
    pub routine: Option<RoutineName>,
    pub account: Option<AccountId>,
}

impl WorkerStatus {
    fn of(slot: &Slot) -> Self {
        let worker = &slot.worker;
        Self {
            instance_id: worker.instance_id().clone(),
            group: slot.group.lock().clone(),
            state: worker.controller().state(),
            supervision: *slot.supervision.lock(),
            active: slot.is_active(),
            failures: slot.failures.load(Ordering::SeqCst),
            completed_runs: worker.completed_runs(),
            routine: worker.last_routine(),
            account: worker.account(),
        }
    }
}

/// Snapshot of a group and its pool.
#[derive(Debug, Clone, Serialize)]
pub struct GroupStatus {
    pub name: GroupName,
    pub routine: RoutineName,
    pub pool: Option<String>,
    pub pool_stats: Option<PoolStats>,
    pub members: Vec<WorkerStatus>,
}

impl GroupStatus {
    /// Members currently under supervision.
    pub fn active(&self) -> usize {
        self.members.iter().filter(|m| m.active).count()
    }
}

impl<E, D> Coordinator<E, D>
where
    E: RoutineExecutor,
    D: DeviceAdapter,
{
    /// Every slot, ordered by instance id.
    pub fn status(&self) -> Vec<WorkerStatus> {
        self.shared
            .slots
            .read()
            .values()
            .map(|slot| WorkerStatus::of(slot))
            .collect()
    }

    pub fn worker_status(&self, id: &InstanceId) -> Option<WorkerStatus> {
        self.shared
            .slots
            .read()
            .get(id)
            .map(|slot| WorkerStatus::of(slot))
    }

    pub fn group_status(&self, name: &GroupName) -> Result<GroupStatus, CoordinatorError> {
        let groups = self.shared.groups.read();
        let group = groups
            .get(name)
            .ok_or_else(|| CoordinatorError::GroupNotFound(name.clone()))?;
        let slots = self.shared.slots.read();
        let members = group
            .members
            .iter()
            .filter_map(|id| slots.get(id))
            .map(|slot| WorkerStatus::of(slot))
            .collect();
        let pool = group.launch.pool.as_ref();
        Ok(GroupStatus {
            name: name.clone(),
            routine: group.launch.routine.clone(),
            pool: pool.map(|p| p.name().to_string()),
            pool_stats: pool.map(|p| p.stats()),
            members,
        })
    }
}
