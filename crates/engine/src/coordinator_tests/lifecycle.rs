// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn launch_runs_routine_to_completion() {
    let ctx = setup(FakeRun::Succeed);
    let pool = pool(&["acc-1"]);
    let bot = id("bot-1");

    ctx.coordinator
        .launch(&bot, LaunchSpec::new("daily").pool(Arc::clone(&pool)))
        .await
        .unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();

    assert_eq!(ctx.coordinator.state(&bot), Some(ExecutionState::Completed));
    assert_eq!(
        pool.account(&AccountId::new("acc-1")).unwrap().state,
        AccountState::Completed
    );
    assert_eq!(ctx.device.attached(), 1);

    ctx.wait_for_event(EventKind::WorkerCompleted, "bot-1").await;
    assert_eq!(
        ctx.kinds("bot-1"),
        vec![
            EventKind::WorkerCreated,
            EventKind::ResourceCheckedOut,
            EventKind::WorkerStarted,
            EventKind::ResourceReturned,
            EventKind::WorkerCompleted,
        ]
    );

    let status = ctx.coordinator.worker_status(&bot).unwrap();
    assert!(!status.active);
    assert_eq!(status.completed_runs, 1);
    assert_eq!(status.routine, Some(RoutineName::new("daily")));
    assert_eq!(status.supervision, SupervisionState::Idle);
}

#[tokio::test]
async fn launch_unknown_routine_is_rejected() {
    let ctx = setup(FakeRun::Succeed);
    let err = ctx
        .coordinator
        .launch(&id("bot-1"), LaunchSpec::new("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::RoutineNotFound(_)));
    assert!(ctx.coordinator.status().is_empty());
}

#[tokio::test]
async fn until_exhausted_needs_a_pool() {
    let ctx = setup(FakeRun::Succeed);
    let err = ctx
        .coordinator
        .launch(&id("bot-1"), LaunchSpec::new("daily").repeat(Repeat::UntilExhausted))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidLaunch(_)));
}

#[tokio::test]
async fn create_worker_is_idempotent_and_shares_catalogs() {
    let ctx = setup(FakeRun::Succeed);
    let a = ctx.coordinator.create_worker(&id("bot-1")).await.unwrap();
    let again = ctx.coordinator.create_worker(&id("bot-1")).await.unwrap();
    let b = ctx.coordinator.create_worker(&id("bot-2")).await.unwrap();

    assert!(Arc::ptr_eq(&a, &again));
    assert!(Arc::ptr_eq(a.catalogs(), b.catalogs()));
    assert!(Arc::ptr_eq(a.catalogs(), ctx.coordinator.catalogs()));
    assert_eq!(ctx.device.attached(), 2);
    assert_eq!(a.controller().state(), ExecutionState::Idle);
}

#[tokio::test]
async fn create_worker_surfaces_device_errors() {
    let ctx = setup(FakeRun::Succeed);
    ctx.device.set_unavailable(&id("bot-9"));
    let err = ctx.coordinator.create_worker(&id("bot-9")).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Device(_)));
    assert!(ctx.coordinator.worker(&id("bot-9")).is_none());
}

#[tokio::test]
async fn second_launch_on_running_slot_is_busy() {
    let ctx = setup(FakeRun::UntilStopped);
    let bot = id("bot-1");
    ctx.coordinator.launch(&bot, LaunchSpec::new("farm")).await.unwrap();
    ctx.wait_for_state(&bot, ExecutionState::Running).await;

    let err = ctx
        .coordinator
        .launch(&bot, LaunchSpec::new("daily"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::InstanceBusy(_)));

    ctx.coordinator.stop(&bot).unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();
}

#[tokio::test]
async fn pause_and_resume_follow_controller_rules() {
    let ctx = setup(FakeRun::UntilStopped);
    let bot = id("bot-1");
    ctx.coordinator.launch(&bot, LaunchSpec::new("farm")).await.unwrap();
    ctx.wait_for_state(&bot, ExecutionState::Running).await;

    ctx.coordinator.pause(&bot).unwrap();
    assert_eq!(ctx.coordinator.state(&bot), Some(ExecutionState::Paused));
    let err = ctx.coordinator.pause(&bot).unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::InvalidTransition {
            op: "pause",
            state: ExecutionState::Paused,
            ..
        }
    ));

    ctx.coordinator.resume(&bot).unwrap();
    assert_eq!(ctx.coordinator.state(&bot), Some(ExecutionState::Running));
    assert!(ctx.coordinator.resume(&bot).is_err());

    ctx.coordinator.stop(&bot).unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();
    assert_eq!(ctx.coordinator.state(&bot), Some(ExecutionState::Stopped));

    ctx.wait_for_event(EventKind::WorkerStopped, "bot-1").await;
    let kinds = ctx.kinds("bot-1");
    assert!(kinds.contains(&EventKind::WorkerPaused));
    assert!(kinds.contains(&EventKind::WorkerResumed));
}

#[tokio::test]
async fn stop_unblocks_a_paused_worker() {
    let ctx = setup(FakeRun::UntilStopped);
    let bot = id("bot-1");
    ctx.coordinator.launch(&bot, LaunchSpec::new("farm")).await.unwrap();
    ctx.wait_for_state(&bot, ExecutionState::Running).await;
    ctx.coordinator.pause(&bot).unwrap();

    ctx.coordinator.stop(&bot).unwrap();
    ctx.coordinator.stop(&bot).unwrap();
    tokio::time::timeout(Duration::from_secs(5), ctx.coordinator.wait(&bot))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ctx.coordinator.state(&bot), Some(ExecutionState::Stopped));
}

#[tokio::test]
async fn unknown_instance_is_not_found() {
    let ctx = setup(FakeRun::Succeed);
    let ghost = id("ghost");
    assert!(matches!(ctx.coordinator.pause(&ghost), Err(CoordinatorError::NotFound(_))));
    assert!(matches!(ctx.coordinator.resume(&ghost), Err(CoordinatorError::NotFound(_))));
    assert!(matches!(ctx.coordinator.stop(&ghost), Err(CoordinatorError::NotFound(_))));
    assert!(matches!(
        ctx.coordinator.restart(&ghost).await,
        Err(CoordinatorError::NotFound(_))
    ));
    assert_eq!(ctx.coordinator.state(&ghost), None);
}

#[tokio::test]
async fn restart_without_history_fails() {
    let ctx = setup(FakeRun::Succeed);
    let bot = id("bot-1");
    ctx.coordinator.create_worker(&bot).await.unwrap();
    assert!(matches!(
        ctx.coordinator.restart(&bot).await,
        Err(CoordinatorError::NoLastRoutine(_))
    ));
}

#[tokio::test]
async fn restart_relaunches_last_routine() {
    let ctx = setup(FakeRun::Succeed);
    let bot = id("bot-1");
    ctx.coordinator.launch(&bot, LaunchSpec::new("daily")).await.unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();

    ctx.coordinator.restart(&bot).await.unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();

    let calls = ctx.executor.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.routine == "daily"));
}

#[tokio::test]
async fn restart_stops_a_running_launch_first() {
    let ctx = setup(FakeRun::UntilStopped);
    let bot = id("bot-1");
    ctx.coordinator.launch(&bot, LaunchSpec::new("farm")).await.unwrap();
    ctx.wait_for_state(&bot, ExecutionState::Running).await;

    ctx.coordinator.restart(&bot).await.unwrap();
    until("second run", || ctx.executor.call_count() == 2).await;
    ctx.wait_for_state(&bot, ExecutionState::Running).await;
    assert_eq!(ctx.executor.running(), 1);

    ctx.coordinator.stop(&bot).unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();
}

#[tokio::test]
async fn repeat_times_runs_with_fresh_accounts() {
    let ctx = setup(FakeRun::Succeed);
    let pool = pool(&["a", "b", "c", "d"]);
    let bot = id("bot-1");
    ctx.coordinator
        .launch(
            &bot,
            LaunchSpec::new("daily")
                .pool(Arc::clone(&pool))
                .repeat(Repeat::Times(3)),
        )
        .await
        .unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();

    let accounts: Vec<_> = ctx
        .executor
        .calls()
        .into_iter()
        .filter_map(|c| c.account)
        .collect();
    assert_eq!(accounts.len(), 3);
    assert_eq!(pool.stats().completed, 3);
    assert_eq!(pool.stats().available, 1);
    assert_eq!(ctx.coordinator.worker_status(&bot).unwrap().completed_runs, 3);
}

#[tokio::test]
async fn until_exhausted_drains_the_pool_and_completes() {
    let ctx = setup(FakeRun::Succeed);
    let pool = pool(&["a", "b", "c"]);
    let bot = id("bot-1");
    ctx.coordinator
        .launch(
            &bot,
            LaunchSpec::new("daily")
                .pool(Arc::clone(&pool))
                .repeat(Repeat::UntilExhausted)
                .restart(RestartPolicy::enabled()),
        )
        .await
        .unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();

    assert_eq!(ctx.executor.call_count(), 3);
    assert_eq!(pool.stats().completed, 3);
    assert_eq!(ctx.coordinator.state(&bot), Some(ExecutionState::Completed));
    assert!(ctx.events_of(EventKind::WorkerRestartScheduled).is_empty());
}

#[tokio::test]
async fn exhausted_pool_fails_a_single_run() {
    let ctx = setup(FakeRun::Succeed);
    let pool = pool(&[]);
    let bot = id("bot-1");
    ctx.coordinator
        .launch(&bot, LaunchSpec::new("daily").pool(pool))
        .await
        .unwrap();
    ctx.coordinator.wait(&bot).await.unwrap();

    assert_eq!(ctx.executor.call_count(), 0);
    assert_eq!(ctx.coordinator.state(&bot), Some(ExecutionState::Stopped));
    ctx.wait_for_event(EventKind::WorkerFailed, "bot-1").await;
}

#[tokio::test]
async fn stop_interrupts_a_waiting_checkout() {
    let ctx = setup(FakeRun::Succeed);
    let pool = pool_with(PoolConfig::new("main").wait(WaitPolicy::Indefinite), &[]);
    let bot = id("bot-1");
    ctx.coordinator
        .launch(&bot, LaunchSpec::new("daily").pool(pool))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(ctx.coordinator.worker_status(&bot).unwrap().active);

    ctx.coordinator.stop(&bot).unwrap();
    tokio::time::timeout(Duration::from_secs(5), ctx.coordinator.wait(&bot))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ctx.coordinator.state(&bot), Some(ExecutionState::Stopped));
    assert_eq!(ctx.executor.call_count(), 0);
}

#[tokio::test]
async fn remove_worker_releases_device() {
    let ctx = setup(FakeRun::UntilStopped);
    let bot = id("bot-1");
    ctx.coordinator.launch(&bot, LaunchSpec::new("farm")).await.unwrap();
    ctx.wait_for_state(&bot, ExecutionState::Running).await;

    ctx.coordinator.remove_worker(&bot).await.unwrap();
    assert!(ctx.coordinator.worker(&bot).is_none());
    assert_eq!(ctx.device.attached(), 0);
    ctx.wait_for_event(EventKind::WorkerRemoved, "bot-1").await;
}

#[tokio::test]
async fn reload_catalogs_publishes_event() {
    let ctx = setup(FakeRun::Succeed);
    let summary = ctx.coordinator.reload_catalogs().unwrap();
    assert_eq!(summary, ReloadSummary { routines: 0, templates: 0 });
    ctx.wait_for_event(EventKind::RegistryReloaded, "coordinator").await;
}

#[tokio::test]
async fn pool_helpers_publish_events() {
    let ctx = setup(FakeRun::Succeed);
    let pool = pool(&["a"]);
    let summary = ctx.coordinator.refresh_pool(&pool).unwrap();
    assert_eq!(summary.total, 1);
    ctx.coordinator.close_pool(&pool);
    assert!(pool.is_closed());

    ctx.wait_for_event(EventKind::PoolClosed, "main").await;
    assert_eq!(ctx.kinds("main"), vec![EventKind::PoolRefreshed, EventKind::PoolClosed]);
}
