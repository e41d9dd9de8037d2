// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pooled account model.
//!
//! Only the resource pool writes account state. Workers hold a snapshot of
//! the account they checked out and hand back an [`ReturnOutcome`].

use crate::id::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Checkout state of a pooled account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    Available,
    InUse,
    Completed,
    Failed,
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccountState::Available => "available",
            AccountState::InUse => "in_use",
            AccountState::Completed => "completed",
            AccountState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How a worker finished with an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReturnOutcome {
    /// Handed back unused; the account becomes available again.
    Released,
    /// The routine finished with this account.
    Succeeded,
    /// The routine failed while holding this account.
    Failed { reason: String },
}

impl ReturnOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        ReturnOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReturnOutcome::Released => "released",
            ReturnOutcome::Succeeded => "succeeded",
            ReturnOutcome::Failed { .. } => "failed",
        }
    }
}

/// Raw account as discovered by an upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    /// Numeric attributes used by selection policies (e.g. `packs`).
    #[serde(default)]
    pub fields: BTreeMap<String, i64>,
}

impl AccountRecord {
    pub fn new(id: impl Into<AccountId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: i64) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

/// An account in a pool's working set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub fields: BTreeMap<String, i64>,
    pub state: AccountState,
    /// Failed returns since the last reset.
    pub failures: u32,
    /// Successful runs completed with this account.
    pub uses: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checkout_ms: Option<u64>,
    pub discovered_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Account {
    pub fn from_record(record: AccountRecord, now_ms: u64) -> Self {
        Self {
            id: record.id,
            fields: record.fields,
            state: AccountState::Available,
            failures: 0,
            uses: 0,
            last_checkout_ms: None,
            discovered_ms: now_ms,
            last_error: None,
        }
    }

    /// Named numeric field, if the account has it.
    pub fn field(&self, name: &str) -> Option<i64> {
        self.fields.get(name).copied()
    }

    pub fn is_available(&self) -> bool {
        self.state == AccountState::Available
    }
}

#[cfg(test)]
#[path = "account_tests.rs"]
mod tests;
