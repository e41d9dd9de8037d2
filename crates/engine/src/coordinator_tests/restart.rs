// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use fleet_adapters::{ExecutorError, RunContext};

fn policy() -> RestartPolicy {
    RestartPolicy::enabled().max_retries(3).delays(
        Duration::from_secs(1),
        2.0,
        Duration::from_secs(60),
    )
}

fn scheduled_delays(ctx: &TestContext) -> Vec<u64> {
    ctx.events_of(EventKind::WorkerRestartScheduled)
        .iter()
        .filter_map(|e| e.data.get("delay_ms").and_then(|v| v.as_u64()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn failing_worker_backs_off_then_gives_up() {
    let ctx = setup(FakeRun::Fail("boom".into()));
    let bot = id("bot-1");
    let started = tokio::time::Instant::now();

    ctx.coordinator
        .launch(&bot, LaunchSpec::new("daily").restart(policy()))
        .await
        .unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(7));
    assert_eq!(ctx.executor.call_count(), 4);

    let status = ctx.coordinator.worker_status(&bot).unwrap();
    assert_eq!(status.supervision, SupervisionState::GaveUp { failures: 4 });
    assert_eq!(status.failures, 4);
    assert!(!status.active);
    assert_eq!(status.state, ExecutionState::Stopped);

    ctx.wait_for_event(EventKind::WorkerGaveUp, "bot-1").await;
    assert_eq!(scheduled_delays(&ctx), vec![1000, 2000, 4000]);
    assert_eq!(ctx.events_of(EventKind::WorkerFailed).len(), 4);
    let gave_up = &ctx.events_of(EventKind::WorkerGaveUp)[0];
    assert_eq!(gave_up.data["failures"], 4);
}

#[tokio::test(start_paused = true)]
async fn disabled_restart_does_not_retry() {
    let ctx = setup(FakeRun::Fail("boom".into()));
    let bot = id("bot-1");
    ctx.coordinator.launch(&bot, LaunchSpec::new("daily")).await.unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();

    assert_eq!(ctx.executor.call_count(), 1);
    let status = ctx.coordinator.worker_status(&bot).unwrap();
    assert_eq!(status.supervision, SupervisionState::Idle);
    ctx.wait_for_event(EventKind::WorkerFailed, "bot-1").await;
    assert!(ctx.events_of(EventKind::WorkerRestartScheduled).is_empty());
}

#[tokio::test(start_paused = true)]
async fn recovery_resets_backoff() {
    let ctx = setup(FakeRun::Succeed);
    ctx.executor.script([
        FakeRun::Fail("flaky".into()),
        FakeRun::Succeed,
        FakeRun::Fail("flaky".into()),
        FakeRun::Succeed,
    ]);
    let bot = id("bot-1");
    ctx.coordinator
        .launch(
            &bot,
            LaunchSpec::new("daily").restart(policy()).repeat(Repeat::Times(2)),
        )
        .await
        .unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();

    assert_eq!(ctx.executor.call_count(), 4);
    assert_eq!(ctx.coordinator.state(&bot), Some(ExecutionState::Completed));
    until("both restarts observed", || scheduled_delays(&ctx).len() == 2).await;
    assert_eq!(scheduled_delays(&ctx), vec![1000, 1000]);
}

#[tokio::test(start_paused = true)]
async fn supervision_state_tracks_backoff() {
    let ctx = setup(FakeRun::Fail("boom".into()));
    let bot = id("bot-1");
    let slow = RestartPolicy::enabled().delays(
        Duration::from_secs(30),
        2.0,
        Duration::from_secs(60),
    );
    ctx.coordinator
        .launch(&bot, LaunchSpec::new("daily").restart(slow))
        .await
        .unwrap();
    ctx.wait_for_event(EventKind::WorkerRestartScheduled, "bot-1").await;

    let status = ctx.coordinator.worker_status(&bot).unwrap();
    assert_eq!(
        status.supervision,
        SupervisionState::Backoff {
            attempt: 1,
            delay_ms: 30_000
        }
    );
    assert!(status.active);

    ctx.coordinator.stop(&bot).unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_pending_restart() {
    let ctx = setup(FakeRun::Fail("boom".into()));
    let bot = id("bot-1");
    let hour = RestartPolicy::enabled().delays(
        Duration::from_secs(3600),
        1.0,
        Duration::from_secs(3600),
    );
    ctx.coordinator
        .launch(&bot, LaunchSpec::new("daily").restart(hour))
        .await
        .unwrap();
    ctx.wait_for_event(EventKind::WorkerRestartScheduled, "bot-1").await;

    let before = tokio::time::Instant::now();
    ctx.coordinator.stop(&bot).unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();

    assert!(before.elapsed() < Duration::from_secs(3600));
    assert_eq!(ctx.executor.call_count(), 1);
    let status = ctx.coordinator.worker_status(&bot).unwrap();
    assert_eq!(status.supervision, SupervisionState::Idle);
    assert_eq!(status.state, ExecutionState::Stopped);
    ctx.wait_for_event(EventKind::WorkerStopped, "bot-1").await;
}

#[tokio::test(start_paused = true)]
async fn failing_run_returns_account_before_retry() {
    let ctx = setup(FakeRun::Fail("captcha".into()));
    let pool = pool(&["a", "b"]);
    let bot = id("bot-1");
    ctx.coordinator
        .launch(
            &bot,
            LaunchSpec::new("daily")
                .pool(Arc::clone(&pool))
                .restart(RestartPolicy::enabled().max_retries(1)),
        )
        .await
        .unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();

    let stats = pool.stats();
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.failed, 2);
    assert!(pool.accounts().iter().all(|a| a.failures == 1));
}

/// Executor that panics on every run.
#[derive(Clone)]
struct PanickingExecutor;

#[async_trait]
impl RoutineExecutor for PanickingExecutor {
    async fn run(&self, _routine: Arc<Routine>, _ctx: RunContext) -> Result<(), ExecutorError> {
        panic!("executor bug");
    }
}

#[tokio::test]
async fn executor_panic_fails_the_run_not_the_coordinator() {
    let device = FakeDeviceAdapter::new();
    let coordinator = Coordinator::new(CoordinatorDeps {
        executor: PanickingExecutor,
        device,
        bus: EventBus::new(BusConfig::default()),
        catalogs: Arc::new(Catalogs::new(
            RoutineCatalog::new().with_routine(Routine::new("daily")),
            TemplateCatalog::new(),
        )),
    });
    let pool = pool(&["a"]);
    let bot = id("bot-1");

    coordinator
        .launch(&bot, LaunchSpec::new("daily").pool(Arc::clone(&pool)))
        .await
        .unwrap();
    coordinator.wait(&bot).await.unwrap();

    assert_eq!(coordinator.state(&bot), Some(ExecutionState::Stopped));
    assert_eq!(pool.stats().in_use, 0);
    assert_eq!(pool.stats().failed, 1);

    // The coordinator keeps serving other slots.
    coordinator.create_worker(&id("bot-2")).await.unwrap();
    assert_eq!(coordinator.status().len(), 2);
}
