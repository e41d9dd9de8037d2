// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use fleet_adapters::FakeRun;
use fleet_core::{EventKind, InstanceId};
use fleet_engine::{LaunchSpec, RestartDecision, RestartPolicy, RestartTracker, SupervisionState};

use crate::prelude::{until, Fleet};

fn policy() -> RestartPolicy {
    RestartPolicy::enabled().max_retries(3).delays(
        Duration::from_secs(1),
        2.0,
        Duration::from_secs(5),
    )
}

#[test]
fn three_failures_back_off_then_give_up() {
    let mut tracker = RestartTracker::new(policy());
    let mut delays = Vec::new();
    loop {
        match tracker.on_failure() {
            RestartDecision::Retry { delay, .. } => {
                delays.push(delay);
                tracker.on_relaunch();
            }
            RestartDecision::GiveUp { failures } => {
                assert_eq!(failures, 4);
                break;
            }
            RestartDecision::NoRestart => panic!("policy is enabled"),
        }
    }
    assert_eq!(
        delays,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
    assert_eq!(tracker.state(), SupervisionState::GaveUp { failures: 4 });
}

#[test]
fn success_resets_next_delay() {
    let mut tracker = RestartTracker::new(policy());
    assert!(matches!(tracker.on_failure(), RestartDecision::Retry { .. }));
    tracker.on_relaunch();
    tracker.on_success();
    assert!(matches!(
        tracker.on_failure(),
        RestartDecision::Retry { attempt: 1, delay } if delay == Duration::from_secs(1)
    ));
}

#[tokio::test(start_paused = true)]
async fn coordinator_applies_backoff_and_reports_give_up() {
    let fleet = Fleet::new(FakeRun::Fail("crashed".into()));
    let bot = InstanceId::new("bot-1");

    fleet
        .coordinator
        .launch(&bot, LaunchSpec::new("daily").restart(policy()))
        .await
        .unwrap();
    fleet.coordinator.wait(&bot).await.unwrap();
    until("give-up event", || {
        fleet.events().iter().any(|e| e.kind == EventKind::WorkerGaveUp)
    })
    .await;

    let delays: Vec<u64> = fleet
        .events()
        .iter()
        .filter(|e| e.kind == EventKind::WorkerRestartScheduled)
        .filter_map(|e| e.data["delay_ms"].as_u64())
        .collect();
    assert_eq!(delays, vec![1000, 2000, 4000]);
    assert_eq!(fleet.executor.call_count(), 4);
    assert_eq!(
        fleet.coordinator.worker_status(&bot).unwrap().supervision,
        SupervisionState::GaveUp { failures: 4 }
    );
}
