// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::event_bus::BusConfig;
use crate::registry::{RoutineCatalog, TemplateCatalog};
use fleet_adapters::{FakeExecutor, FakeRun};
use fleet_core::{AccountRecord, AccountState, ExecutionState, Routine, RoutineStep};
use fleet_pool::{PoolConfig, StaticSource};
use std::time::Duration;

fn catalogs() -> Arc<Catalogs> {
    Arc::new(Catalogs::new(
        RoutineCatalog::new().with_routine(
            Routine::new("daily").with_step(RoutineStep::new("claim").template("claim_button")),
        ),
        TemplateCatalog::new().with_template("claim_button", "/t/claim_button.png"),
    ))
}

fn worker(id: &str) -> Worker {
    let instance_id = InstanceId::new(id);
    Worker::new(
        instance_id.clone(),
        DeviceHandle::new(instance_id, "emu"),
        catalogs(),
    )
}

fn pool(ids: &[&str]) -> Arc<ResourcePool> {
    let records = ids.iter().map(|id| AccountRecord::new(*id)).collect();
    Arc::new(ResourcePool::new(PoolConfig::new("main"), StaticSource::new(records)).unwrap())
}

#[tokio::test]
async fn successful_run_completes_account() {
    let bus = EventBus::new(BusConfig::default());
    let worker = worker("bot-1");
    let pool = pool(&["acc-1"]);
    let executor = FakeExecutor::default();

    let outcome = worker
        .run_once(&executor, &bus, &RoutineName::new("daily"), Some(&pool))
        .await;
    assert_eq!(outcome, RunOutcome::Completed);
    assert!(worker.account().is_none());
    assert_eq!(
        pool.account(&AccountId::new("acc-1")).unwrap().state,
        AccountState::Completed
    );

    worker.settle(&bus, &outcome);
    assert_eq!(worker.controller().state(), ExecutionState::Completed);
    assert_eq!(worker.completed_runs(), 1);
    assert_eq!(worker.last_routine(), Some(RoutineName::new("daily")));

    let calls = executor.calls();
    assert_eq!(calls[0].account, Some(AccountId::new("acc-1")));
}

#[tokio::test]
async fn failed_run_marks_account_failed() {
    let bus = EventBus::new(BusConfig::default());
    let worker = worker("bot-1");
    let pool = pool(&["acc-1"]);
    let executor = FakeExecutor::new(FakeRun::Fail("captcha".into()));

    let outcome = worker
        .run_once(&executor, &bus, &RoutineName::new("daily"), Some(&pool))
        .await;
    assert!(matches!(outcome, RunOutcome::Failed(ref msg) if msg.contains("captcha")));

    let account = pool.account(&AccountId::new("acc-1")).unwrap();
    assert_eq!(account.failures, 1);
    assert_eq!(account.state, AccountState::Failed);

    worker.settle(&bus, &outcome);
    assert_eq!(worker.controller().state(), ExecutionState::Stopped);
}

#[tokio::test]
async fn empty_pool_is_exhausted() {
    let bus = EventBus::new(BusConfig::default());
    let worker = worker("bot-1");
    let pool = pool(&[]);
    let executor = FakeExecutor::default();

    let outcome = worker
        .run_once(&executor, &bus, &RoutineName::new("daily"), Some(&pool))
        .await;
    assert!(matches!(outcome, RunOutcome::Exhausted(_)));
    assert_eq!(executor.call_count(), 0);
}

#[tokio::test]
async fn unknown_routine_fails_without_checkout() {
    let bus = EventBus::new(BusConfig::default());
    let worker = worker("bot-1");
    let pool = pool(&["acc-1"]);

    let outcome = worker
        .run_once(&FakeExecutor::default(), &bus, &RoutineName::new("nope"), Some(&pool))
        .await;
    assert!(matches!(outcome, RunOutcome::Failed(_)));
    assert_eq!(pool.stats().available, 1);
}

#[tokio::test]
async fn stop_mid_run_releases_account() {
    let bus = EventBus::new(BusConfig::default());
    let worker = Arc::new(worker("bot-1"));
    let pool = pool(&["acc-1"]);
    let executor = FakeExecutor::new(FakeRun::UntilStopped);

    let run = tokio::spawn({
        let worker = Arc::clone(&worker);
        let pool = Arc::clone(&pool);
        let bus = bus.clone();
        async move {
            worker
                .run_once(&executor, &bus, &RoutineName::new("daily"), Some(&pool))
                .await
        }
    });

    for _ in 0..200 {
        if worker.controller().state() == ExecutionState::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(worker.account(), Some(AccountId::new("acc-1")));
    worker.controller().force_stop();

    assert_eq!(run.await.unwrap(), RunOutcome::Stopped);
    assert_eq!(pool.stats().available, 1);
    assert!(worker.account().is_none());
}

#[tokio::test]
async fn run_without_pool_passes_no_account() {
    let bus = EventBus::new(BusConfig::default());
    let worker = worker("bot-1");
    let executor = FakeExecutor::default();

    let outcome = worker
        .run_once(&executor, &bus, &RoutineName::new("daily"), None)
        .await;
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(executor.calls()[0].account, None);
}

#[tokio::test]
async fn run_publishes_lifecycle_events() {
    let bus = EventBus::new(BusConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    bus.subscribe_all({
        let seen = Arc::clone(&seen);
        move |e: &Event| seen.lock().push(e.kind)
    });

    let worker = worker("bot-1");
    let pool = pool(&["acc-1"]);
    let outcome = worker
        .run_once(&FakeExecutor::default(), &bus, &RoutineName::new("daily"), Some(&pool))
        .await;
    worker.settle(&bus, &outcome);
    bus.stop().await;

    assert_eq!(
        *seen.lock(),
        vec![
            EventKind::ResourceCheckedOut,
            EventKind::WorkerStarted,
            EventKind::ResourceReturned,
            EventKind::WorkerCompleted,
        ]
    );
}
