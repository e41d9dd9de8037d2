// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker execution state machine.
//!
//! The controller separates *requesting* a transition (any thread: the
//! coordinator, a control surface) from *acting* on it (the worker task,
//! at checkpoints between routine steps). State lives in an atomic and is
//! the source of truth; the single-slot signal channels only wake a worker
//! that is parked in [`ExecutionController::check_pause_or_stop`].
//!
//! ```text
//! Idle ──► Running ──► Paused ──► Running
//!              │          │
//!              ├──────────┴──► Stopped
//!              └─────────────► Completed
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Lifecycle state of one worker's routine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
}

impl ExecutionState {
    /// Stopped and Completed end a run; nothing but `reset` leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionState::Stopped | ExecutionState::Completed)
    }

    /// Whether `self -> next` is an edge of the state machine.
    ///
    /// `Stopped` is reachable from every state because force-stop is
    /// unconditional.
    pub fn can_transition_to(self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        match (self, next) {
            (_, Stopped) => true,
            (Idle, Running) => true,
            (Running, Paused) | (Running, Completed) => true,
            (Paused, Running) => true,
            _ => false,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ExecutionState::Idle => 0,
            ExecutionState::Running => 1,
            ExecutionState::Paused => 2,
            ExecutionState::Stopped => 3,
            ExecutionState::Completed => 4,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ExecutionState::Running,
            2 => ExecutionState::Paused,
            3 => ExecutionState::Stopped,
            4 => ExecutionState::Completed,
            _ => ExecutionState::Idle,
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionState::Idle => "idle",
            ExecutionState::Running => "running",
            ExecutionState::Paused => "paused",
            ExecutionState::Stopped => "stopped",
            ExecutionState::Completed => "completed",
        };
        f.write_str(s)
    }
}

struct SignalReceivers {
    pause: mpsc::Receiver<()>,
    resume: mpsc::Receiver<()>,
    stop: mpsc::Receiver<()>,
}

/// One generation of signal channels. Replaced wholesale by `reset`.
struct Signals {
    pause_tx: mpsc::Sender<()>,
    resume_tx: mpsc::Sender<()>,
    stop_tx: mpsc::Sender<()>,
    halted: watch::Sender<bool>,
    receivers: tokio::sync::Mutex<SignalReceivers>,
}

impl Signals {
    fn new() -> Self {
        let (pause_tx, pause) = mpsc::channel(1);
        let (resume_tx, resume) = mpsc::channel(1);
        let (stop_tx, stop) = mpsc::channel(1);
        let (halted, _) = watch::channel(false);
        Self {
            pause_tx,
            resume_tx,
            stop_tx,
            halted,
            receivers: tokio::sync::Mutex::new(SignalReceivers {
                pause,
                resume,
                stop,
            }),
        }
    }
}

/// Pause/resume/stop control for a single worker.
///
/// Shared as `Arc<ExecutionController>` between the worker task and whoever
/// controls it. All methods take `&self` and are safe from any thread.
pub struct ExecutionController {
    state: AtomicU8,
    signals: Mutex<Arc<Signals>>,
}

impl Default for ExecutionController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionController")
            .field("state", &self.state())
            .finish()
    }
}

impl ExecutionController {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ExecutionState::Idle.as_u8()),
            signals: Mutex::new(Arc::new(Signals::new())),
        }
    }

    /// Current state.
    pub fn state(&self) -> ExecutionState {
        ExecutionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn store(&self, state: ExecutionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn transition(&self, from: ExecutionState, to: ExecutionState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn signals(&self) -> Arc<Signals> {
        Arc::clone(&self.signals.lock())
    }

    pub fn set_running(&self) {
        self.store(ExecutionState::Running);
    }

    pub fn set_completed(&self) {
        self.store(ExecutionState::Completed);
    }

    pub fn set_idle(&self) {
        self.store(ExecutionState::Idle);
    }

    /// Running -> Paused. Returns `false` (and changes nothing) otherwise.
    pub fn pause(&self) -> bool {
        if !self.transition(ExecutionState::Running, ExecutionState::Paused) {
            return false;
        }
        // Full slot means a pause is already pending; coalesce.
        let _ = self.signals().pause_tx.try_send(());
        tracing::debug!("pause requested");
        true
    }

    /// Paused -> Running. Returns `false` (and changes nothing) otherwise.
    pub fn resume(&self) -> bool {
        if !self.transition(ExecutionState::Paused, ExecutionState::Running) {
            return false;
        }
        let _ = self.signals().resume_tx.try_send(());
        tracing::debug!("resume requested");
        true
    }

    /// Unconditionally move to Stopped and signal stop. Idempotent.
    pub fn force_stop(&self) -> bool {
        let previous = ExecutionState::from_u8(
            self.state
                .swap(ExecutionState::Stopped.as_u8(), Ordering::SeqCst),
        );
        let signals = self.signals();
        let _ = signals.stop_tx.try_send(());
        signals.halted.send_replace(true);
        if previous != ExecutionState::Stopped {
            tracing::debug!(from = %previous, "stop requested");
        }
        true
    }

    /// Return to Idle with fresh, empty signal channels.
    ///
    /// Any pause, resume or stop that was pending from the previous run is
    /// discarded along with the old channels.
    pub fn reset(&self) {
        let mut signals = self.signals.lock();
        *signals = Arc::new(Signals::new());
        self.store(ExecutionState::Idle);
    }

    /// Checkpoint called by a routine executor between steps.
    ///
    /// Returns `true` to keep going, `false` when the caller must unwind.
    /// Blocks while the controller is paused.
    pub async fn check_pause_or_stop(&self) -> bool {
        let signals = self.signals();
        match self.state() {
            ExecutionState::Stopped | ExecutionState::Completed => return false,
            ExecutionState::Paused => {
                let mut rx = signals.receivers.lock().await;
                return self.wait_while_paused(&mut rx).await;
            }
            ExecutionState::Idle | ExecutionState::Running => {}
        }

        let mut rx = signals.receivers.lock().await;
        if rx.stop.try_recv().is_ok() {
            return false;
        }
        if rx.pause.try_recv().is_ok() {
            return self.wait_while_paused(&mut rx).await;
        }
        // A pause or stop may have landed between the state load and the
        // signal drain; the state is authoritative.
        match self.state() {
            ExecutionState::Paused => self.wait_while_paused(&mut rx).await,
            state => !state.is_terminal(),
        }
    }

    async fn wait_while_paused(&self, rx: &mut SignalReceivers) -> bool {
        loop {
            match self.state() {
                ExecutionState::Paused => {}
                ExecutionState::Stopped | ExecutionState::Completed => return false,
                ExecutionState::Idle | ExecutionState::Running => {
                    while rx.pause.try_recv().is_ok() {}
                    return true;
                }
            }
            tokio::select! {
                biased;
                stop = rx.stop.recv() => {
                    if stop.is_some() {
                        return false;
                    }
                }
                _ = rx.resume.recv() => {}
            }
        }
    }

    /// Resolves once `force_stop` has been called on the current run.
    ///
    /// Used to interrupt blocking waits (e.g. an account checkout) that sit
    /// outside the executor's checkpoints.
    pub async fn stopped(&self) {
        let mut rx = self.signals().halted.subscribe();
        if rx.wait_for(|halted| *halted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
