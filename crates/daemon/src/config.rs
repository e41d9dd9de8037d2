// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fleetd.toml`: the bus, catalogs, pools and groups the daemon runs.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fleet_core::{GroupName, InstanceId, RoutineName};
use fleet_engine::{BusConfig, CatalogPaths, GroupSpec, LaunchSpec, Repeat, RestartPolicy};
use fleet_pool::{PoolConfig, ResourcePool};
use serde::Deserialize;
use thiserror::Error;

/// Config errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub bus: BusConfig,
    pub catalogs: CatalogPaths,
    pub pools: Vec<PoolSection>,
    pub groups: Vec<GroupSection>,
}

/// A `[[pools]]` entry: a pool backed by a directory of account files.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolSection {
    pub accounts_dir: PathBuf,
    /// Refresh when the directory changes.
    #[serde(default)]
    pub watch: bool,
    #[serde(flatten)]
    pub config: PoolConfig,
}

/// A `[[groups]]` entry, launched at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupSection {
    pub name: GroupName,
    #[serde(default)]
    pub instances: Vec<InstanceId>,
    pub count: Option<u32>,
    /// Prefix for numbered members; defaults to the group name.
    pub prefix: Option<String>,
    pub routine: RoutineName,
    pub pool: Option<String>,
    #[serde(default)]
    pub repeat: Repeat,
    #[serde(default)]
    pub restart: RestartPolicy,
}

impl GroupSection {
    pub fn members(&self) -> Vec<InstanceId> {
        match self.count {
            Some(count) if self.instances.is_empty() => {
                let prefix = self.prefix.as_deref().unwrap_or(self.name.as_str());
                (1..=count as usize)
                    .map(|n| InstanceId::numbered(prefix, n))
                    .collect()
            }
            _ => self.instances.clone(),
        }
    }

    /// Build the launch for this group against the daemon's pools.
    pub fn to_spec(
        &self,
        pools: &BTreeMap<String, Arc<ResourcePool>>,
    ) -> Result<GroupSpec, ConfigError> {
        let mut launch = LaunchSpec::new(self.routine.clone())
            .restart(self.restart.clone())
            .repeat(self.repeat);
        if let Some(name) = &self.pool {
            let pool = pools.get(name).ok_or_else(|| {
                ConfigError::Invalid(format!("group {}: unknown pool {}", self.name, name))
            })?;
            launch = launch.pool(Arc::clone(pool));
        }
        Ok(GroupSpec::new(self.name.clone(), self.members(), launch))
    }
}

impl DaemonConfig {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load `path`, or fall back to an empty fleet when an optional file is absent.
    pub fn load_or_default(path: &Path, required: bool) -> Result<Self, ConfigError> {
        if !required && !path.exists() {
            tracing::info!(path = %path.display(), "no config file, starting with an empty fleet");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Cross-section checks serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut pools = HashSet::new();
        for pool in &self.pools {
            if !pools.insert(pool.config.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate pool {}",
                    pool.config.name
                )));
            }
        }

        let mut groups = HashSet::new();
        let mut claimed: HashSet<InstanceId> = HashSet::new();
        for group in &self.groups {
            if !groups.insert(&group.name) {
                return Err(ConfigError::Invalid(format!("duplicate group {}", group.name)));
            }
            match (group.instances.is_empty(), group.count) {
                (false, Some(_)) => {
                    return Err(ConfigError::Invalid(format!(
                        "group {}: set either instances or count, not both",
                        group.name
                    )));
                }
                (true, None) | (true, Some(0)) => {
                    return Err(ConfigError::Invalid(format!(
                        "group {}: no members",
                        group.name
                    )));
                }
                _ => {}
            }
            if let Some(pool) = &group.pool {
                if !pools.contains(pool.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "group {}: unknown pool {}",
                        group.name, pool
                    )));
                }
            }
            for member in group.members() {
                if !claimed.insert(member.clone()) {
                    return Err(ConfigError::Invalid(format!(
                        "instance {} is in more than one group",
                        member
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
