// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named groups of slots sharing one launch spec.

use super::{Coordinator, LaunchSpec};
use crate::error::CoordinatorError;
use fleet_adapters::{DeviceAdapter, RoutineExecutor};
use fleet_core::{EventKind, GroupName, InstanceId};
use serde_json::json;

/// A group to launch: its members and what they all run.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub name: GroupName,
    pub instances: Vec<InstanceId>,
    pub launch: LaunchSpec,
}

impl GroupSpec {
    pub fn new(name: impl Into<GroupName>, instances: Vec<InstanceId>, launch: LaunchSpec) -> Self {
        Self {
            name: name.into(),
            instances,
            launch,
        }
    }

    /// Members `prefix-1` through `prefix-count`.
    pub fn numbered(
        name: impl Into<GroupName>,
        prefix: &str,
        count: u32,
        launch: LaunchSpec,
    ) -> Self {
        let instances = (1..=count as usize)
            .map(|n| InstanceId::numbered(prefix, n))
            .collect();
        Self::new(name, instances, launch)
    }
}

pub(crate) struct Group {
    pub(crate) members: Vec<InstanceId>,
    pub(crate) launch: LaunchSpec,
}

impl<E, D> Coordinator<E, D>
where
    E: RoutineExecutor,
    D: DeviceAdapter,
{
    fn members(&self, name: &GroupName) -> Result<Vec<InstanceId>, CoordinatorError> {
        self.shared
            .groups
            .read()
            .get(name)
            .map(|g| g.members.clone())
            .ok_or_else(|| CoordinatorError::GroupNotFound(name.clone()))
    }

    fn any_active(&self, ids: &[InstanceId]) -> Option<InstanceId> {
        let slots = self.shared.slots.read();
        ids.iter()
            .find(|id| slots.get(*id).is_some_and(|s| s.is_active()))
            .cloned()
    }

    /// Launch every member of a group with the group's spec.
    ///
    /// Nothing is started unless every member can be: a running member or
    /// an unknown routine fails the whole call. If a member fails to start
    /// midway, the members already started are stopped again.
    pub async fn launch_group(&self, spec: GroupSpec) -> Result<Vec<InstanceId>, CoordinatorError> {
        self.ensure_running()?;
        self.validate(&spec.launch)?;
        if let Ok(existing) = self.members(&spec.name) {
            if self.any_active(&existing).is_some() {
                return Err(CoordinatorError::GroupExists(spec.name));
            }
        }
        if let Some(busy) = self.any_active(&spec.instances) {
            return Err(CoordinatorError::InstanceBusy(busy));
        }

        self.shared.groups.write().insert(
            spec.name.clone(),
            Group {
                members: spec.instances.clone(),
                launch: spec.launch.clone(),
            },
        );

        let mut started = Vec::with_capacity(spec.instances.len());
        for id in &spec.instances {
            let result = async {
                self.create_worker(id).await?;
                let slot = self.slot(id)?;
                *slot.group.lock() = Some(spec.name.clone());
                self.start(&slot, spec.launch.clone()).await
            }
            .await;

            if let Err(e) = result {
                tracing::warn!(group = %spec.name, instance_id = %id, error = %e, "group launch failed, stopping started members");
                for started_id in &started {
                    let _ = self.stop(started_id);
                }
                self.shared.groups.write().remove(&spec.name);
                return Err(e);
            }
            started.push(id.clone());
        }

        tracing::info!(group = %spec.name, members = started.len(), routine = %spec.launch.routine, "group launched");
        self.publish(
            EventKind::GroupLaunched,
            spec.name.as_str(),
            json!({ "instances": started, "routine": spec.launch.routine }),
        );
        Ok(started)
    }

    /// Pause every running member. Returns how many were paused.
    pub fn pause_group(&self, name: &GroupName) -> Result<usize, CoordinatorError> {
        let members = self.members(name)?;
        Ok(members.iter().filter(|id| self.pause(id).is_ok()).count())
    }

    /// Resume every paused member. Returns how many were resumed.
    pub fn resume_group(&self, name: &GroupName) -> Result<usize, CoordinatorError> {
        let members = self.members(name)?;
        Ok(members.iter().filter(|id| self.resume(id).is_ok()).count())
    }

    /// Stop every member and wait until all have exited.
    pub async fn stop_group(&self, name: &GroupName) -> Result<usize, CoordinatorError> {
        let members = self.members(name)?;
        let slots: Vec<_> = members.iter().filter_map(|id| self.slot(id).ok()).collect();
        for slot in &slots {
            slot.halt();
        }
        for slot in &slots {
            self.halt_and_join(slot).await;
        }

        tracing::info!(group = %name, members = slots.len(), "group stopped");
        self.publish(
            EventKind::GroupStopped,
            name.as_str(),
            json!({ "instances": members }),
        );
        Ok(slots.len())
    }

    pub fn groups(&self) -> Vec<GroupName> {
        self.shared.groups.read().keys().cloned().collect()
    }
}
