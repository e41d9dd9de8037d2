// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator tests

mod groups;
mod lifecycle;
mod restart;
mod shutdown;

use super::*;
use crate::event_bus::BusConfig;
use crate::registry::{RoutineCatalog, TemplateCatalog};
use fleet_adapters::{FakeDeviceAdapter, FakeExecutor, FakeRun};
use fleet_core::{AccountId, AccountRecord, AccountState, Routine, RoutineStep};
use fleet_pool::{PoolConfig, StaticSource, WaitPolicy};
use std::time::Duration;

type TestCoordinator = Coordinator<FakeExecutor, FakeDeviceAdapter>;

/// Test context holding the coordinator and its fakes
struct TestContext {
    coordinator: TestCoordinator,
    executor: FakeExecutor,
    device: FakeDeviceAdapter,
    events: Arc<Mutex<Vec<Event>>>,
}

fn setup(default: FakeRun) -> TestContext {
    let executor = FakeExecutor::new(default);
    let device = FakeDeviceAdapter::new();
    let bus = EventBus::new(BusConfig::default());
    let events = Arc::new(Mutex::new(Vec::new()));
    bus.subscribe_all({
        let events = Arc::clone(&events);
        move |e: &Event| events.lock().push(e.clone())
    });
    let catalogs = Arc::new(Catalogs::new(
        RoutineCatalog::new()
            .with_routine(Routine::new("daily").with_step(RoutineStep::new("claim").command("tap")))
            .with_routine(Routine::new("farm")),
        TemplateCatalog::new(),
    ));
    let coordinator = Coordinator::new(CoordinatorDeps {
        executor: executor.clone(),
        device: device.clone(),
        bus,
        catalogs,
    });
    TestContext {
        coordinator,
        executor,
        device,
        events,
    }
}

fn id(s: &str) -> InstanceId {
    InstanceId::new(s)
}

fn pool(ids: &[&str]) -> Arc<ResourcePool> {
    pool_with(PoolConfig::new("main"), ids)
}

fn pool_with(config: PoolConfig, ids: &[&str]) -> Arc<ResourcePool> {
    let records = ids.iter().map(|id| AccountRecord::new(*id)).collect();
    Arc::new(ResourcePool::new(config, StaticSource::new(records)).unwrap())
}

/// Poll `check` until it holds, failing after a generous timeout.
async fn until(what: &str, check: impl Fn() -> bool) {
    for _ in 0..2000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

impl TestContext {
    fn kinds(&self, source: &str) -> Vec<EventKind> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.source == source)
            .map(|e| e.kind)
            .collect()
    }

    fn events_of(&self, kind: EventKind) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    async fn wait_for_event(&self, kind: EventKind, source: &str) {
        until(&format!("{kind} from {source}"), || {
            self.events
                .lock()
                .iter()
                .any(|e| e.kind == kind && e.source == source)
        })
        .await;
    }

    async fn wait_for_state(&self, instance: &InstanceId, state: ExecutionState) {
        until(&format!("{instance} to be {state}"), || {
            self.coordinator.state(instance) == Some(state)
        })
        .await;
    }
}
