// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test helpers for behavioral specifications.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use fleet_adapters::{FakeDeviceAdapter, FakeExecutor, FakeRun};
use fleet_core::{AccountRecord, Event, Routine, RoutineStep};
use fleet_engine::{
    BusConfig, Catalogs, Coordinator, CoordinatorDeps, EventBus, RoutineCatalog, TemplateCatalog,
};
use fleet_pool::{PoolConfig, ResourcePool, StaticSource};
use parking_lot::Mutex;

pub type FleetCoordinator = Coordinator<FakeExecutor, FakeDeviceAdapter>;

/// A coordinator on fakes, with every bus event recorded.
pub struct Fleet {
    pub coordinator: FleetCoordinator,
    pub executor: FakeExecutor,
    pub device: FakeDeviceAdapter,
    pub events: Arc<Mutex<Vec<Event>>>,
}

impl Fleet {
    pub fn new(default: FakeRun) -> Self {
        let executor = FakeExecutor::new(default);
        let device = FakeDeviceAdapter::new();
        let bus = EventBus::new(BusConfig::default());
        let events = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe_all({
            let events = Arc::clone(&events);
            move |e: &Event| events.lock().push(e.clone())
        });
        let catalogs = Catalogs::new(
            RoutineCatalog::new()
                .with_routine(Routine::new("daily").with_step(RoutineStep::new("claim").command("tap"))),
            TemplateCatalog::new(),
        );
        let coordinator = Coordinator::new(CoordinatorDeps {
            executor: executor.clone(),
            device: device.clone(),
            bus,
            catalogs: Arc::new(catalogs),
        });
        Self {
            coordinator,
            executor,
            device,
            events,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

pub fn static_pool(config: PoolConfig, records: Vec<AccountRecord>) -> (Arc<ResourcePool>, StaticSource) {
    let source = StaticSource::new(records);
    let pool = ResourcePool::new(config, source.clone()).unwrap();
    (Arc::new(pool), source)
}

pub fn accounts(ids: &[&str]) -> Vec<AccountRecord> {
    ids.iter().map(|id| AccountRecord::new(*id)).collect()
}

/// Poll `check` until it holds, failing after a generous timeout.
pub async fn until(what: &str, check: impl Fn() -> bool) {
    for _ in 0..2000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}
