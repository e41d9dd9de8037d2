// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use fleet_core::{ExecutionController, ExecutionState};

#[tokio::test]
async fn reset_discards_a_stale_stop() {
    let controller = ExecutionController::new();
    controller.set_running();
    assert!(controller.force_stop());

    controller.reset();
    assert_eq!(controller.state(), ExecutionState::Idle);

    controller.set_running();
    assert!(controller.check_pause_or_stop().await);
    assert_eq!(controller.state(), ExecutionState::Running);
}

#[tokio::test]
async fn paused_worker_blocks_until_resumed() {
    let controller = Arc::new(ExecutionController::new());
    controller.set_running();
    assert!(controller.pause());

    let checkpoint = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.check_pause_or_stop().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!checkpoint.is_finished());

    assert!(controller.resume());
    assert!(checkpoint.await.unwrap());
}

#[tokio::test]
async fn stop_releases_a_paused_worker() {
    let controller = Arc::new(ExecutionController::new());
    controller.set_running();
    controller.pause();

    let checkpoint = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.check_pause_or_stop().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(controller.force_stop());

    assert!(!checkpoint.await.unwrap());
    assert_eq!(controller.state(), ExecutionState::Stopped);
    assert!(!controller.pause());
    assert!(!controller.resume());
}
