// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: FLEET_STATE_DIR > XDG_STATE_HOME/fleet > ~/.local/state/fleet
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("FLEET_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("fleet"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/fleet"))
}

/// Where the config file was found, and whether it must exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: PathBuf,
    /// Named explicitly (`--config` or `FLEET_CONFIG`) rather than the default.
    pub explicit: bool,
}

/// Resolve config file: `--config` > FLEET_CONFIG > $XDG_CONFIG_HOME/fleet/fleetd.toml
pub fn config_location(arg: Option<PathBuf>) -> Option<ConfigLocation> {
    if let Some(path) = arg {
        return Some(ConfigLocation { path, explicit: true });
    }
    if let Some(path) = std::env::var_os("FLEET_CONFIG") {
        return Some(ConfigLocation {
            path: PathBuf::from(path),
            explicit: true,
        });
    }
    dirs::config_dir().map(|dir| ConfigLocation {
        path: dir.join("fleet").join("fleetd.toml"),
        explicit: false,
    })
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
