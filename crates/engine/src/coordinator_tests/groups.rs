// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn farm_group(pool: &Arc<ResourcePool>) -> GroupSpec {
    GroupSpec::numbered("farmers", "bot", 3, LaunchSpec::new("farm").pool(Arc::clone(pool)))
}

async fn wait_all_running(ctx: &TestContext, ids: &[InstanceId]) {
    for id in ids {
        ctx.wait_for_state(id, ExecutionState::Running).await;
    }
}

#[tokio::test]
async fn group_lifecycle() {
    let ctx = setup(FakeRun::UntilStopped);
    let pool = pool(&["a", "b", "c"]);
    let name = GroupName::new("farmers");

    let members = ctx.coordinator.launch_group(farm_group(&pool)).await.unwrap();
    assert_eq!(members, vec![id("bot-1"), id("bot-2"), id("bot-3")]);
    wait_all_running(&ctx, &members).await;

    let status = ctx.coordinator.group_status(&name).unwrap();
    assert_eq!(status.active(), 3);
    assert_eq!(status.pool.as_deref(), Some("main"));
    assert_eq!(status.pool_stats.unwrap().in_use, 3);
    assert!(status.members.iter().all(|m| m.group == Some(name.clone())));

    assert_eq!(ctx.coordinator.pause_group(&name).unwrap(), 3);
    assert!(members
        .iter()
        .all(|m| ctx.coordinator.state(m) == Some(ExecutionState::Paused)));
    assert_eq!(ctx.coordinator.pause_group(&name).unwrap(), 0);

    assert_eq!(ctx.coordinator.resume_group(&name).unwrap(), 3);
    assert_eq!(ctx.coordinator.stop_group(&name).await.unwrap(), 3);
    assert!(members
        .iter()
        .all(|m| ctx.coordinator.state(m) == Some(ExecutionState::Stopped)));
    assert_eq!(pool.stats().available, 3);
    assert_eq!(ctx.coordinator.group_status(&name).unwrap().active(), 0);

    ctx.wait_for_event(EventKind::GroupStopped, "farmers").await;
    assert_eq!(
        ctx.kinds("farmers"),
        vec![EventKind::GroupLaunched, EventKind::GroupStopped]
    );
}

#[tokio::test]
async fn running_group_cannot_launch_twice() {
    let ctx = setup(FakeRun::UntilStopped);
    let pool = pool(&["a", "b", "c"]);
    let members = ctx.coordinator.launch_group(farm_group(&pool)).await.unwrap();
    wait_all_running(&ctx, &members).await;

    let err = ctx.coordinator.launch_group(farm_group(&pool)).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::GroupExists(_)));

    // Once stopped, the same group may launch again.
    ctx.coordinator.stop_group(&GroupName::new("farmers")).await.unwrap();
    ctx.coordinator.launch_group(farm_group(&pool)).await.unwrap();
    ctx.coordinator.shutdown_all().await;
}

#[tokio::test]
async fn group_refuses_busy_member() {
    let ctx = setup(FakeRun::UntilStopped);
    let bot = id("bot-2");
    ctx.coordinator.launch(&bot, LaunchSpec::new("farm")).await.unwrap();
    ctx.wait_for_state(&bot, ExecutionState::Running).await;

    let pool = pool(&["a", "b", "c"]);
    let err = ctx.coordinator.launch_group(farm_group(&pool)).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::InstanceBusy(ref busy) if *busy == bot));
    assert!(ctx.coordinator.groups().is_empty());
    assert!(ctx.coordinator.worker(&id("bot-1")).is_none());

    ctx.coordinator.shutdown_all().await;
}

#[tokio::test]
async fn failed_group_launch_stops_started_members() {
    let ctx = setup(FakeRun::UntilStopped);
    ctx.device.set_unavailable(&id("bot-3"));
    let pool = pool(&["a", "b", "c"]);

    let err = ctx.coordinator.launch_group(farm_group(&pool)).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Device(_)));
    assert!(ctx.coordinator.groups().is_empty());

    for bot in [id("bot-1"), id("bot-2")] {
        ctx.coordinator.wait(&bot).await.unwrap();
        assert!(!ctx.coordinator.worker_status(&bot).unwrap().active);
    }
    assert_eq!(pool.stats().in_use, 0);
}

#[tokio::test]
async fn unknown_group_is_not_found() {
    let ctx = setup(FakeRun::Succeed);
    let name = GroupName::new("nobody");
    assert!(matches!(
        ctx.coordinator.pause_group(&name),
        Err(CoordinatorError::GroupNotFound(_))
    ));
    assert!(matches!(
        ctx.coordinator.stop_group(&name).await,
        Err(CoordinatorError::GroupNotFound(_))
    ));
    assert!(ctx.coordinator.group_status(&name).is_err());
}

#[tokio::test]
async fn status_lists_slots_in_instance_order() {
    let ctx = setup(FakeRun::Succeed);
    for name in ["c", "a", "b"] {
        ctx.coordinator.create_worker(&id(name)).await.unwrap();
    }
    let ids: Vec<_> = ctx
        .coordinator
        .status()
        .into_iter()
        .map(|s| s.instance_id)
        .collect();
    assert_eq!(ids, vec![id("a"), id("b"), id("c")]);
}
