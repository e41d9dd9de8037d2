// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart policy with exponential backoff.
//!
//! ```text
//! Healthy ──fail──► Backoff(n) ──delay──► Relaunching ──ok──► Healthy
//!                       ▲                      │
//!                       └────────fail──────────┘
//!                   (n > max_retries) ──► GaveUp
//! ```

use fleet_core::duration::serde_str;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a launch reacts to a failed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartPolicy {
    pub enabled: bool,
    /// Consecutive failures that are retried; the next one gives up.
    pub max_retries: u32,
    #[serde(with = "serde_str")]
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    #[serde(with = "serde_str")]
    pub max_delay: Duration,
    /// A successful run clears the failure count.
    pub reset_on_success: bool,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            reset_on_success: true,
        }
    }
}

impl RestartPolicy {
    /// Enabled policy with default tuning.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn delays(mut self, initial: Duration, factor: f64, max: Duration) -> Self {
        self.initial_delay = initial;
        self.backoff_factor = factor;
        self.max_delay = max;
        self
    }

    pub fn reset_on_success(mut self, reset: bool) -> Self {
        self.reset_on_success = reset;
        self
    }

    /// Delay before retry `attempt` (1-based): `initial * factor^(attempt-1)`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        if !secs.is_finite() || secs < 0.0 || secs > self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Supervision state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SupervisionState {
    /// Not under supervision (never launched, or the launch ended).
    Idle,
    Healthy,
    Backoff { attempt: u32, delay_ms: u64 },
    Relaunching { attempt: u32 },
    /// Restart budget spent; the slot stays stopped.
    GaveUp { failures: u32 },
}

/// What to do after a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Retry { attempt: u32, delay: Duration },
    GiveUp { failures: u32 },
    /// Restarts are disabled for this launch.
    NoRestart,
}

/// Per-launch failure bookkeeping.
#[derive(Debug, Clone)]
pub struct RestartTracker {
    policy: RestartPolicy,
    failures: u32,
    state: SupervisionState,
}

impl RestartTracker {
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            failures: 0,
            state: SupervisionState::Healthy,
        }
    }

    pub fn state(&self) -> SupervisionState {
        self.state
    }

    /// Consecutive failures counted so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn on_failure(&mut self) -> RestartDecision {
        self.failures += 1;
        if !self.policy.enabled {
            self.state = SupervisionState::Idle;
            return RestartDecision::NoRestart;
        }
        if self.failures > self.policy.max_retries {
            self.state = SupervisionState::GaveUp {
                failures: self.failures,
            };
            return RestartDecision::GiveUp {
                failures: self.failures,
            };
        }
        let delay = self.policy.delay_for(self.failures);
        self.state = SupervisionState::Backoff {
            attempt: self.failures,
            delay_ms: delay.as_millis() as u64,
        };
        RestartDecision::Retry {
            attempt: self.failures,
            delay,
        }
    }

    /// The backoff delay elapsed and the next run is starting.
    pub fn on_relaunch(&mut self) {
        if let SupervisionState::Backoff { attempt, .. } = self.state {
            self.state = SupervisionState::Relaunching { attempt };
        }
    }

    pub fn on_success(&mut self) {
        if self.policy.reset_on_success {
            self.failures = 0;
        }
        self.state = SupervisionState::Healthy;
    }
}

#[cfg(test)]
#[path = "restart_tests.rs"]
mod tests;
