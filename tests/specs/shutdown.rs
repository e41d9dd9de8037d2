// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use fleet_adapters::FakeRun;
use fleet_core::{AccountState, EventKind, ExecutionState, InstanceId};
use fleet_engine::LaunchSpec;
use fleet_pool::PoolConfig;

use crate::prelude::{accounts, static_pool, until, Fleet};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_all_waits_for_four_workers_and_their_accounts() {
    let fleet = Fleet::new(FakeRun::UntilStopped);
    let (pool, _) = static_pool(PoolConfig::new("main"), accounts(&["a", "b", "c", "d"]));
    let bots: Vec<_> = (1..=4).map(|n| InstanceId::numbered("bot", n)).collect();

    for bot in &bots {
        fleet
            .coordinator
            .launch(bot, LaunchSpec::new("daily").pool(Arc::clone(&pool)))
            .await
            .unwrap();
    }
    until("all four running", || {
        bots.iter()
            .all(|b| fleet.coordinator.state(b) == Some(ExecutionState::Running))
    })
    .await;
    assert_eq!(pool.stats().in_use, 4);

    // A paused worker must not hold shutdown up.
    fleet.coordinator.pause(&bots[0]).unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(5), fleet.coordinator.shutdown_all())
        .await
        .expect("shutdown_all hung");
    assert_eq!(summary.workers, 4);

    for bot in &bots {
        let state = fleet.coordinator.state(bot).unwrap();
        assert!(
            matches!(state, ExecutionState::Stopped | ExecutionState::Completed),
            "{bot} is {state}"
        );
    }
    for account in pool.accounts() {
        assert!(matches!(
            account.state,
            AccountState::Available | AccountState::Completed
        ));
    }
    assert_eq!(pool.stats().in_use, 0);
    assert_eq!(fleet.executor.running(), 0);
    assert_eq!(fleet.device.attached(), 0);

    until("stop events", || {
        fleet
            .events()
            .iter()
            .filter(|e| e.kind == EventKind::WorkerStopped)
            .count()
            == 4
    })
    .await;
}
