// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn shutdown_all_stops_every_worker_and_releases_accounts() {
    let ctx = setup(FakeRun::UntilStopped);
    let pool = pool(&["a", "b", "c", "d"]);
    let bots: Vec<_> = (1..=4).map(|n| InstanceId::numbered("bot", n)).collect();
    for bot in &bots {
        ctx.coordinator
            .launch(bot, LaunchSpec::new("farm").pool(Arc::clone(&pool)))
            .await
            .unwrap();
    }
    for bot in &bots {
        ctx.wait_for_state(bot, ExecutionState::Running).await;
    }
    assert_eq!(pool.stats().in_use, 4);

    let summary = tokio::time::timeout(Duration::from_secs(5), ctx.coordinator.shutdown_all())
        .await
        .unwrap();
    assert_eq!(summary.workers, 4);
    // Each run returned its own account on the way out.
    assert_eq!(summary.accounts_released, 0);

    for bot in &bots {
        assert_eq!(ctx.coordinator.state(bot), Some(ExecutionState::Stopped));
        assert!(!ctx.coordinator.worker_status(bot).unwrap().active);
    }
    assert_eq!(ctx.executor.running(), 0);
    let stats = pool.stats();
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.available, 4);
    assert_eq!(ctx.device.attached(), 0);
}

#[tokio::test]
async fn shutdown_refuses_new_work() {
    let ctx = setup(FakeRun::Succeed);
    ctx.coordinator.create_worker(&id("bot-1")).await.unwrap();
    ctx.coordinator.shutdown_all().await;

    assert!(ctx.coordinator.is_shutting_down());
    assert!(matches!(
        ctx.coordinator.launch(&id("bot-1"), LaunchSpec::new("daily")).await,
        Err(CoordinatorError::ShuttingDown)
    ));
    assert!(matches!(
        ctx.coordinator.create_worker(&id("bot-2")).await,
        Err(CoordinatorError::ShuttingDown)
    ));
    assert!(matches!(
        ctx.coordinator.restart(&id("bot-1")).await,
        Err(CoordinatorError::ShuttingDown)
    ));
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_restarts() {
    let ctx = setup(FakeRun::Fail("boom".into()));
    let slow = RestartPolicy::enabled().delays(
        Duration::from_secs(600),
        1.0,
        Duration::from_secs(600),
    );
    for n in 1..=2 {
        let bot = InstanceId::numbered("bot", n);
        ctx.coordinator
            .launch(&bot, LaunchSpec::new("daily").restart(slow.clone()))
            .await
            .unwrap();
        ctx.wait_for_event(EventKind::WorkerRestartScheduled, bot.as_str())
            .await;
    }

    let before = tokio::time::Instant::now();
    let summary = ctx.coordinator.shutdown_all().await;
    assert!(before.elapsed() < Duration::from_secs(600));
    assert_eq!(summary.workers, 2);
    assert_eq!(ctx.executor.call_count(), 2);
}

#[tokio::test]
async fn shutdown_with_no_workers_is_empty() {
    let ctx = setup(FakeRun::Succeed);
    assert_eq!(ctx.coordinator.shutdown_all().await, ShutdownSummary::default());
    // Idempotent.
    assert_eq!(ctx.coordinator.shutdown_all().await, ShutdownSummary::default());
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_device_acquire_releases_the_device() {
    let ctx = setup(FakeRun::UntilStopped);
    ctx.device.set_acquire_delay(Duration::from_millis(50));
    let launch = tokio::spawn({
        let coordinator = ctx.coordinator.clone();
        async move {
            coordinator
                .launch(&id("bot-1"), LaunchSpec::new("farm"))
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let summary = ctx.coordinator.shutdown_all().await;
    assert_eq!(summary.workers, 0);
    assert!(matches!(
        launch.await.unwrap(),
        Err(CoordinatorError::ShuttingDown)
    ));
    assert!(ctx.coordinator.worker(&id("bot-1")).is_none());
    assert_eq!(ctx.device.attached(), 0);
    assert!(ctx.events_of(EventKind::WorkerCreated).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_racing_a_launch_still_returns() {
    for round in 0..50 {
        let ctx = setup(FakeRun::UntilStopped);
        let bot = id("bot-1");
        ctx.coordinator.create_worker(&bot).await.unwrap();
        let launch = tokio::spawn({
            let coordinator = ctx.coordinator.clone();
            let bot = bot.clone();
            async move { coordinator.launch(&bot, LaunchSpec::new("farm")).await }
        });

        let summary = tokio::time::timeout(Duration::from_secs(5), ctx.coordinator.shutdown_all())
            .await
            .unwrap_or_else(|_| panic!("round {round}: shutdown did not return"));
        assert_eq!(summary.workers, 1);

        // Either the launch got in first and was stopped, or it was refused.
        match launch.await.unwrap() {
            Ok(()) | Err(CoordinatorError::ShuttingDown) => {}
            Err(e) => panic!("round {round}: unexpected launch error {e}"),
        }
        assert!(!ctx.coordinator.worker_status(&bot).unwrap().active);
        assert_eq!(ctx.executor.running(), 0);
        assert_eq!(ctx.device.attached(), 0);
    }
}
