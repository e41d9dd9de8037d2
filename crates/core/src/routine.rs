// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compiled routine handed to a routine executor.
//!
//! The fleet treats a routine as an ordered list of opaque steps; what a
//! step's command means is up to the executor and the device it drives.

use crate::id::RoutineName;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn zero() -> Duration {
    Duration::ZERO
}

/// One step of a routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineStep {
    pub name: String,
    /// Device command issued for this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Template the step expects on screen, by catalog name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Pause after the step before the next checkpoint.
    #[serde(default = "zero", with = "crate::duration::serde_str")]
    pub delay: Duration,
}

impl RoutineStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: None,
            template: None,
            delay: Duration::ZERO,
        }
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A routine ready to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    pub name: RoutineName,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "step")]
    pub steps: Vec<RoutineStep>,
}

impl Routine {
    pub fn new(name: impl Into<RoutineName>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: RoutineStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Templates referenced by any step.
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|s| s.template.as_deref())
    }
}

#[cfg(test)]
#[path = "routine_tests.rs"]
mod tests;
