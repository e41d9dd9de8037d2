// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool configuration

use crate::policy::SelectionPolicy;
use fleet_core::parse_duration;
use serde::Deserialize;
use std::time::Duration;

/// What `checkout` does when no account is eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawWaitPolicy")]
pub enum WaitPolicy {
    /// Fail immediately with `ResourceExhausted`.
    #[default]
    FailFast,
    /// Wait up to the given duration, then fail with `Timeout`.
    Bounded(Duration),
    /// Wait until an account frees up, the pool closes, or the caller cancels.
    Indefinite,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawWaitPolicy {
    Keyword(String),
    Bounded { max_wait: String },
}

impl TryFrom<RawWaitPolicy> for WaitPolicy {
    type Error = String;

    fn try_from(raw: RawWaitPolicy) -> Result<Self, Self::Error> {
        match raw {
            RawWaitPolicy::Keyword(k) => match k.as_str() {
                "fail-fast" | "fail_fast" => Ok(WaitPolicy::FailFast),
                "indefinite" => Ok(WaitPolicy::Indefinite),
                other => Err(format!("unknown wait policy: {}", other)),
            },
            RawWaitPolicy::Bounded { max_wait } => parse_duration(&max_wait).map(WaitPolicy::Bounded),
        }
    }
}

fn default_max_failures() -> u32 {
    3
}

/// Tunables for one pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    #[serde(default)]
    pub policy: SelectionPolicy,
    /// Failures at which an account is excluded until reset.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    /// Put a failed account back in rotation while it is under `max_failures`.
    #[serde(default)]
    pub retry_failed: bool,
    #[serde(default)]
    pub wait: WaitPolicy,
}

impl PoolConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: SelectionPolicy::default(),
            max_failures: default_max_failures(),
            retry_failed: false,
            wait: WaitPolicy::FailFast,
        }
    }

    pub fn policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_failures(mut self, max: u32) -> Self {
        self.max_failures = max;
        self
    }

    pub fn retry_failed(mut self, retry: bool) -> Self {
        self.retry_failed = retry;
        self
    }

    pub fn wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
