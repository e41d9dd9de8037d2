// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_core::{ExecutionState, InstanceId};
use std::path::Path;
use tempfile::tempdir;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Lay out routines and accounts under `root` and return a config using them.
fn fleet_config(root: &Path, routine: &str) -> DaemonConfig {
    write(
        &root.join("routines/daily.toml"),
        r#"
description = "claim the daily reward"

[[step]]
name = "claim"
command = "tap 100 200"
"#,
    );
    write(&root.join("accounts/a.json"), r#"{ "level": 3 }"#);
    write(&root.join("accounts/b.json"), r#"{ "level": 7 }"#);

    let toml = format!(
        r#"
[catalogs]
routines_dir = "{root}/routines"

[[pools]]
name = "main"
accounts_dir = "{root}/accounts"

[[groups]]
name = "bots"
count = 2
routine = "{routine}"
pool = "main"
"#,
        root = root.display(),
    );
    DaemonConfig::parse(&toml, Path::new("fleetd.toml")).unwrap()
}

#[tokio::test]
async fn startup_writes_pid_and_shutdown_removes_it() {
    let dir = tempdir().unwrap();
    let paths = Paths::under(dir.path().join("state"));

    let daemon = startup(&DaemonConfig::default(), &paths).await.unwrap();
    let pid = std::fs::read_to_string(&paths.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());

    let summary = daemon.shutdown().await;
    assert_eq!(summary, ShutdownSummary::default());
    assert!(!paths.lock_path.exists());
}

#[tokio::test]
async fn startup_lock_failed_does_not_remove_existing_files() {
    let dir = tempdir().unwrap();
    let paths = Paths::under(dir.path().to_owned());
    let running = startup(&DaemonConfig::default(), &paths).await.unwrap();

    let second = startup(&DaemonConfig::default(), &paths).await;
    assert!(matches!(second, Err(LifecycleError::LockFailed(_))));
    assert!(paths.lock_path.exists());
    let pid = std::fs::read_to_string(&paths.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());

    running.shutdown().await;
}

#[tokio::test]
async fn startup_launches_configured_groups() {
    let dir = tempdir().unwrap();
    let config = fleet_config(dir.path(), "daily");
    let paths = Paths::under(dir.path().join("state"));

    let daemon = startup(&config, &paths).await.unwrap();
    assert_eq!(daemon.groups, vec![GroupName::new("bots")]);

    for member in ["bots-1", "bots-2"] {
        daemon.coordinator.wait(&InstanceId::new(member)).await.unwrap();
        assert_eq!(
            daemon.coordinator.state(&InstanceId::new(member)),
            Some(ExecutionState::Completed)
        );
    }
    let pool = Arc::clone(&daemon.pools["main"]);
    assert_eq!(pool.stats().completed, 2);

    let summary = daemon.shutdown().await;
    assert_eq!(summary.workers, 2);
    assert!(pool.is_closed());
}

#[tokio::test]
async fn failed_group_launch_unwinds_startup() {
    let dir = tempdir().unwrap();
    let config = fleet_config(dir.path(), "missing");
    let paths = Paths::under(dir.path().join("state"));

    let err = startup(&config, &paths).await.err().unwrap();
    assert!(matches!(
        err,
        LifecycleError::Coordinator(CoordinatorError::RoutineNotFound(_))
    ));
    assert!(!paths.lock_path.exists());

    // The lock went with the failed attempt.
    let daemon = startup(&DaemonConfig::default(), &paths).await.unwrap();
    daemon.shutdown().await;
}

#[tokio::test]
async fn reload_picks_up_new_routines_and_accounts() {
    let dir = tempdir().unwrap();
    let mut config = fleet_config(dir.path(), "daily");
    config.groups.clear();
    let paths = Paths::under(dir.path().join("state"));
    let daemon = startup(&config, &paths).await.unwrap();
    assert!(!daemon.coordinator.catalogs().routines().contains("weekly"));

    write(&dir.path().join("routines/weekly.toml"), "");
    write(&dir.path().join("accounts/c.json"), "{}");
    daemon.reload();

    assert!(daemon.coordinator.catalogs().routines().contains("weekly"));
    assert_eq!(daemon.pools["main"].stats().total, 3);
    daemon.shutdown().await;
}

#[tokio::test]
async fn event_log_counts_as_a_subscriber() {
    let bus = EventBus::new(fleet_engine::BusConfig::default());
    attach_event_log(&bus);
    assert_eq!(bus.subscriber_count(), 1);
    bus.publish(Event::new(fleet_core::EventKind::WorkerFailed, "bot-1"));
    bus.stop().await;
    assert_eq!(bus.delivered_count(), 1);
    assert_eq!(bus.handler_panics(), 0);
}
