// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::device::DeviceHandle;
use fleet_core::ExecutionController;

fn ctx(id: &str) -> RunContext {
    let controller = Arc::new(ExecutionController::new());
    controller.set_running();
    let instance_id = InstanceId::new(id);
    RunContext::new(
        instance_id.clone(),
        controller,
        DeviceHandle::new(instance_id, "fake"),
    )
}

#[tokio::test]
async fn fake_executor_plays_script_then_default() {
    let executor = FakeExecutor::new(FakeRun::Succeed);
    executor.script([FakeRun::Fail("boom".to_string())]);
    let routine = Arc::new(Routine::new("daily"));

    let first = executor.run(Arc::clone(&routine), ctx("bot-1")).await;
    assert!(matches!(first, Err(ExecutorError::Step { ref message, .. }) if message == "boom"));

    let second = executor.run(routine, ctx("bot-1")).await;
    assert!(second.is_ok());

    let calls = executor.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].routine, "daily");
    assert_eq!(executor.running(), 0);
}

#[tokio::test(start_paused = true)]
async fn until_stopped_runs_until_force_stop() {
    let executor = FakeExecutor::new(FakeRun::UntilStopped);
    let ctx = ctx("bot-2");
    let controller = Arc::clone(&ctx.controller);

    let run = tokio::spawn({
        let executor = executor.clone();
        async move { executor.run(Arc::new(Routine::new("farm")), ctx).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(executor.running(), 1);

    controller.force_stop();
    let result = run.await.unwrap();
    assert_eq!(result, Err(ExecutorError::Interrupted));
    assert_eq!(executor.running(), 0);
}
