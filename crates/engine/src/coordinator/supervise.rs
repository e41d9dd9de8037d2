// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervision loop for one slot's launch.

use super::{LaunchSpec, Repeat, Slot};
use crate::event_bus::EventBus;
use crate::restart::{RestartDecision, RestartTracker, SupervisionState};
use crate::worker::RunOutcome;
use fleet_adapters::RoutineExecutor;
use fleet_core::{Event, EventKind};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::watch;

/// Clears the slot's active flag however the task ends.
struct ActiveGuard(Arc<Slot>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.store(false, Ordering::SeqCst);
    }
}

async fn halted(rx: &mut watch::Receiver<bool>) {
    // A closed channel means the slot is gone; treat it as a halt.
    let _ = rx.wait_for(|halted| *halted).await;
}

pub(super) async fn supervise<E: RoutineExecutor>(
    executor: E,
    bus: EventBus,
    slot: Arc<Slot>,
    spec: LaunchSpec,
) {
    let _guard = ActiveGuard(Arc::clone(&slot));
    let worker = Arc::clone(&slot.worker);
    let id = worker.instance_id().clone();
    let mut halt_rx = slot.halt.subscribe();
    let mut tracker = RestartTracker::new(spec.restart.clone());
    let mut completed = 0u32;

    loop {
        worker.controller().reset();
        if slot.is_halted() {
            worker.settle(&bus, &RunOutcome::Stopped);
            break;
        }

        let outcome = worker
            .run_once(&executor, &bus, &spec.routine, spec.pool.as_ref())
            .await;

        let reason = match &outcome {
            RunOutcome::Exhausted(reason) if spec.repeat == Repeat::UntilExhausted => {
                tracing::info!(instance_id = %id, runs = completed, %reason, "pool exhausted, launch complete");
                worker.controller().set_completed();
                bus.publish(Event::new(EventKind::WorkerCompleted, id.as_str()).with_data(json!({
                    "routine": spec.routine,
                    "runs": worker.completed_runs(),
                    "reason": "pool exhausted",
                })));
                break;
            }
            RunOutcome::Completed => {
                worker.settle(&bus, &outcome);
                tracker.on_success();
                slot.set_supervision(tracker.state(), tracker.failures());
                completed += 1;
                if spec.repeat.again(completed) {
                    continue;
                }
                break;
            }
            RunOutcome::Stopped => {
                worker.settle(&bus, &outcome);
                break;
            }
            RunOutcome::Failed(reason) | RunOutcome::Exhausted(reason) => {
                worker.settle(&bus, &outcome);
                reason.clone()
            }
        };

        // A stop that raced with the failure wins over a restart.
        if slot.is_halted() {
            break;
        }

        match tracker.on_failure() {
            RestartDecision::Retry { attempt, delay } => {
                slot.set_supervision(tracker.state(), tracker.failures());
                tracing::info!(
                    instance_id = %id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "restart scheduled"
                );
                bus.publish(Event::new(EventKind::WorkerRestartScheduled, id.as_str()).with_data(
                    json!({
                        "attempt": attempt,
                        "delay_ms": delay.as_millis() as u64,
                        "error": reason,
                    }),
                ));

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = halted(&mut halt_rx) => {
                        worker.settle(&bus, &RunOutcome::Stopped);
                        break;
                    }
                }
                tracker.on_relaunch();
                slot.set_supervision(tracker.state(), tracker.failures());
            }
            RestartDecision::GiveUp { failures } => {
                slot.set_supervision(tracker.state(), failures);
                tracing::warn!(instance_id = %id, failures, error = %reason, "restart budget spent, giving up");
                bus.publish(Event::new(EventKind::WorkerGaveUp, id.as_str()).with_data(json!({
                    "failures": failures,
                    "error": reason,
                })));
                return;
            }
            RestartDecision::NoRestart => {
                slot.set_supervision(SupervisionState::Idle, tracker.failures());
                return;
            }
        }
    }

    slot.set_supervision(SupervisionState::Idle, tracker.failures());
}
