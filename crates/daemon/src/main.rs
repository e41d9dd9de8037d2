// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet Daemon (fleetd)
//!
//! Loads the fleet config, launches its groups under supervision, and runs
//! until SIGINT or SIGTERM. SIGHUP reloads catalogs and refreshes pools.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod env;
mod lifecycle;

use std::path::PathBuf;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use crate::config::DaemonConfig;
use crate::lifecycle::{LifecycleError, Paths};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What the command line asked for
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run { config: Option<PathBuf> },
    Help,
    Version,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command, String> {
    let mut config = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" | "-v" => return Ok(Command::Version),
            "--help" | "-h" | "help" => return Ok(Command::Help),
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| format!("'{arg}' needs a path"))?;
                config = Some(PathBuf::from(path));
            }
            other => match other.strip_prefix("--config=") {
                Some(path) => config = Some(PathBuf::from(path)),
                None => return Err(format!("unexpected argument '{other}'")),
            },
        }
    }
    Ok(Command::Run { config })
}

fn print_help() {
    println!("fleetd {VERSION}");
    println!("Fleet Daemon - supervises bot instances working through account pools");
    println!();
    println!("USAGE:");
    println!("    fleetd [--config <path>]");
    println!();
    println!("The config file is taken from --config, then $FLEET_CONFIG, then");
    println!("$XDG_CONFIG_HOME/fleet/fleetd.toml. State and logs live under");
    println!("$FLEET_STATE_DIR (default ~/.local/state/fleet).");
    println!();
    println!("SIGNALS:");
    println!("    SIGINT, SIGTERM  Stop every worker, close pools and exit");
    println!("    SIGHUP           Reload catalogs and refresh pools");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <path>  Config file");
    println!("    -h, --help           Print help information");
    println!("    -v, --version        Print version information");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    let config_arg = match parse_args(std::env::args().skip(1)) {
        Ok(Command::Version) => {
            println!("fleetd {VERSION}");
            return Ok(());
        }
        Ok(Command::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Command::Run { config }) => config,
        Err(msg) => {
            eprintln!("error: {msg}");
            eprintln!("Usage: fleetd [--help | --version | --config <path>]");
            std::process::exit(1);
        }
    };

    let paths = Paths::under(env::state_dir()?);

    // Write startup marker to log (before tracing setup, so it leads this run's lines)
    write_startup_marker(&paths)?;
    let log_guard = setup_logging(&paths)?;

    let config = match env::config_location(config_arg) {
        Some(location) => {
            info!(path = %location.path.display(), "loading config");
            DaemonConfig::load_or_default(&location.path, location.explicit)
        }
        None => Ok(DaemonConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            let e = LifecycleError::from(e);
            write_startup_error(&paths, &e);
            error!("Failed to load config: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    info!(version = VERSION, "Starting fleet daemon");
    let daemon = match lifecycle::startup(&config, &paths).await {
        Ok(daemon) => daemon,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&paths.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("fleetd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&paths, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    info!(
        groups = daemon.groups.len(),
        pools = daemon.pools.len(),
        "Daemon ready"
    );
    println!("READY");

    loop {
        tokio::select! {
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading...");
                daemon.reload();
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down...");
                break;
            }
        }
    }

    daemon.shutdown().await;
    info!("Daemon stopped");
    drop(log_guard);
    Ok(())
}

/// Startup marker prefix written to log before anything else.
/// Full format: "--- fleetd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- fleetd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(paths: &Paths) -> Result<(), LifecycleError> {
    use std::io::Write;

    std::fs::create_dir_all(&paths.state_dir)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

/// Write startup error synchronously to log file.
fn write_startup_error(paths: &Paths, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    paths: &Paths,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let file_appender = tracing_appender::rolling::never(
        paths.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        paths.log_path.file_name().ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
