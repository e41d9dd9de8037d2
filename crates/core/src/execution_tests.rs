// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

fn running() -> Arc<ExecutionController> {
    let ctl = Arc::new(ExecutionController::new());
    ctl.set_running();
    ctl
}

#[test]
fn new_controller_is_idle() {
    assert_eq!(ExecutionController::new().state(), ExecutionState::Idle);
}

#[yare::parameterized(
    idle_to_running      = { ExecutionState::Idle,      ExecutionState::Running,   true },
    running_to_paused    = { ExecutionState::Running,   ExecutionState::Paused,    true },
    running_to_completed = { ExecutionState::Running,   ExecutionState::Completed, true },
    paused_to_running    = { ExecutionState::Paused,    ExecutionState::Running,   true },
    paused_to_stopped    = { ExecutionState::Paused,    ExecutionState::Stopped,   true },
    idle_to_stopped      = { ExecutionState::Idle,      ExecutionState::Stopped,   true },
    idle_to_paused       = { ExecutionState::Idle,      ExecutionState::Paused,    false },
    paused_to_completed  = { ExecutionState::Paused,    ExecutionState::Completed, false },
    completed_to_running = { ExecutionState::Completed, ExecutionState::Running,   false },
    stopped_to_running   = { ExecutionState::Stopped,   ExecutionState::Running,   false },
)]
fn transition_edges(from: ExecutionState, to: ExecutionState, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[test]
fn pause_requires_running() {
    let ctl = ExecutionController::new();
    assert!(!ctl.pause());
    assert_eq!(ctl.state(), ExecutionState::Idle);

    ctl.set_running();
    assert!(ctl.pause());
    assert_eq!(ctl.state(), ExecutionState::Paused);
    assert!(!ctl.pause(), "second pause is rejected");
}

#[test]
fn resume_requires_paused() {
    let ctl = running();
    assert!(!ctl.resume());
    assert_eq!(ctl.state(), ExecutionState::Running);

    ctl.pause();
    assert!(ctl.resume());
    assert_eq!(ctl.state(), ExecutionState::Running);
}

#[test]
fn force_stop_is_idempotent_from_any_state() {
    let ctl = ExecutionController::new();
    assert!(ctl.force_stop());
    assert!(ctl.force_stop());
    assert_eq!(ctl.state(), ExecutionState::Stopped);
    assert!(!ctl.resume());
    assert!(!ctl.pause());
}

#[tokio::test]
async fn checkpoint_passes_while_running() {
    let ctl = running();
    assert!(ctl.check_pause_or_stop().await);
    assert!(ctl.check_pause_or_stop().await);
}

#[tokio::test]
async fn checkpoint_returns_false_when_terminal() {
    let ctl = running();
    ctl.set_completed();
    assert!(!ctl.check_pause_or_stop().await);

    let ctl = running();
    ctl.force_stop();
    assert!(!ctl.check_pause_or_stop().await);
}

#[tokio::test]
async fn checkpoint_blocks_until_resume() {
    let ctl = running();
    assert!(ctl.pause());

    let waiter = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.check_pause_or_stop().await }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished(), "checkpoint must block while paused");

    assert!(ctl.resume());
    let resumed = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert!(resumed);
}

#[tokio::test]
async fn checkpoint_unblocks_on_stop_while_paused() {
    let ctl = running();
    ctl.pause();

    let waiter = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.check_pause_or_stop().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    ctl.force_stop();
    let resumed = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert!(!resumed);
}

#[tokio::test]
async fn pause_resume_before_checkpoint_does_not_block() {
    let ctl = running();
    ctl.pause();
    ctl.resume();
    let ok = tokio::time::timeout(Duration::from_secs(1), ctl.check_pause_or_stop())
        .await
        .unwrap();
    assert!(ok);
    assert_eq!(ctl.state(), ExecutionState::Running);
}

#[tokio::test]
async fn pause_resume_pause_leaves_worker_parked() {
    let ctl = running();
    ctl.pause();
    ctl.resume();
    ctl.pause();

    let waiter = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.check_pause_or_stop().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished(), "stale resume must not release a paused worker");

    ctl.resume();
    let ok = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert!(ok);
}

#[tokio::test]
async fn reset_discards_pending_stop() {
    let ctl = running();
    ctl.force_stop();
    ctl.reset();
    assert_eq!(ctl.state(), ExecutionState::Idle);

    ctl.set_running();
    assert!(
        ctl.check_pause_or_stop().await,
        "stop from the previous run must not leak into the next"
    );
}

#[tokio::test]
async fn reset_discards_pending_pause() {
    let ctl = running();
    ctl.pause();
    ctl.reset();
    ctl.set_running();
    let ok = tokio::time::timeout(Duration::from_secs(1), ctl.check_pause_or_stop())
        .await
        .unwrap();
    assert!(ok);
}

#[tokio::test]
async fn stopped_future_resolves_on_force_stop() {
    let ctl = running();
    let waiter = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.stopped().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!waiter.is_finished());

    ctl.force_stop();
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn stopped_future_is_immediate_after_stop() {
    let ctl = running();
    ctl.force_stop();
    tokio::time::timeout(Duration::from_millis(100), ctl.stopped())
        .await
        .unwrap();
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Pause,
        Resume,
        Stop,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Pause), Just(Op::Resume), Just(Op::Stop)]
    }

    proptest! {
        #[test]
        fn transitions_follow_edges(ops in proptest::collection::vec(op(), 0..40)) {
            let ctl = ExecutionController::new();
            ctl.set_running();
            for op in ops {
                let before = ctl.state();
                let accepted = match op {
                    Op::Pause => ctl.pause(),
                    Op::Resume => ctl.resume(),
                    Op::Stop => ctl.force_stop(),
                };
                let after = ctl.state();
                if accepted {
                    prop_assert!(
                        before == after || before.can_transition_to(after),
                        "{:?}: {} -> {} is not an edge", op, before, after
                    );
                } else {
                    prop_assert_eq!(before, after);
                }
            }
        }
    }
}
