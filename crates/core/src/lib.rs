// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-core: shared types for the bot fleet supervisor

pub mod account;
pub mod duration;
pub mod event;
pub mod execution;
pub mod id;
pub mod routine;

pub use account::{Account, AccountRecord, AccountState, ReturnOutcome};
pub use duration::{format_duration, parse_duration};
pub use event::{now_epoch_ms, Event, EventKind};
pub use execution::{ExecutionController, ExecutionState};
pub use id::{AccountId, EventId, GroupName, InstanceId, RoutineName};
pub use routine::{Routine, RoutineStep};
