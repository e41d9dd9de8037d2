// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative account selection policy.
//!
//! A policy is a pure function of the working set: the same accounts always
//! produce the same order and the same pick, which keeps refresh + select
//! deterministic and testable without timing.

use fleet_core::Account;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Attribute an account can be sorted by.
///
/// Parsed from a plain string: the reserved names below, or any other name
/// as a numeric account field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortField {
    /// Failed returns since last reset.
    Failures,
    /// Successful runs.
    Uses,
    /// Time of last checkout; never checked out counts as oldest.
    LastCheckout,
    /// Time the account was first discovered.
    Discovered,
    /// Numeric account field such as `packs`.
    Field(String),
}

impl From<String> for SortField {
    fn from(s: String) -> Self {
        match s.as_str() {
            "failures" => SortField::Failures,
            "uses" => SortField::Uses,
            "last_checkout" => SortField::LastCheckout,
            "discovered" => SortField::Discovered,
            _ => SortField::Field(s),
        }
    }
}

impl From<SortField> for String {
    fn from(f: SortField) -> Self {
        match f {
            SortField::Failures => "failures".to_string(),
            SortField::Uses => "uses".to_string(),
            SortField::LastCheckout => "last_checkout".to_string(),
            SortField::Discovered => "discovered".to_string(),
            SortField::Field(name) => name,
        }
    }
}

impl SortField {
    fn key(&self, account: &Account) -> Option<i64> {
        match self {
            SortField::Failures => Some(i64::from(account.failures)),
            SortField::Uses => Some(account.uses as i64),
            SortField::LastCheckout => Some(account.last_checkout_ms.unwrap_or(0) as i64),
            SortField::Discovered => Some(account.discovered_ms as i64),
            SortField::Field(name) => account.field(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// One sort criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub by: SortField,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(by: impl Into<String>) -> Self {
        Self {
            by: SortField::from(by.into()),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(by: impl Into<String>) -> Self {
        Self {
            by: SortField::from(by.into()),
            order: SortOrder::Desc,
        }
    }

    /// Accounts missing the key sort after those that have it, in either order.
    fn compare(&self, a: &Account, b: &Account) -> Ordering {
        match (self.by.key(a), self.by.key(b)) {
            (Some(x), Some(y)) => match self.order {
                SortOrder::Asc => x.cmp(&y),
                SortOrder::Desc => y.cmp(&x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Predicate an account must satisfy to be eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    AtLeast { field: String, value: i64 },
    AtMost { field: String, value: i64 },
    Equals { field: String, value: i64 },
    Has { field: String },
}

impl Filter {
    pub fn matches(&self, account: &Account) -> bool {
        match self {
            Filter::AtLeast { field, value } => account.field(field).is_some_and(|v| v >= *value),
            Filter::AtMost { field, value } => account.field(field).is_some_and(|v| v <= *value),
            Filter::Equals { field, value } => account.field(field) == Some(*value),
            Filter::Has { field } => account.field(field).is_some(),
        }
    }
}

/// Sort keys applied in order, then filters, then ties broken by id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectionPolicy {
    #[serde(default)]
    pub sort: Vec<SortKey>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl SelectionPolicy {
    /// Highest value of `field` first, e.g. "most packs first".
    pub fn most_first(field: &str) -> Self {
        Self {
            sort: vec![SortKey::desc(field)],
            filters: Vec::new(),
        }
    }

    /// Least recently checked out first.
    pub fn oldest_first() -> Self {
        Self {
            sort: vec![SortKey::asc("last_checkout")],
            filters: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn compare(&self, a: &Account, b: &Account) -> Ordering {
        self.sort
            .iter()
            .map(|key| key.compare(a, b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }

    /// Whether an account may be handed out right now.
    pub fn is_eligible(&self, account: &Account, max_failures: u32) -> bool {
        account.is_available()
            && account.failures < max_failures
            && self.filters.iter().all(|f| f.matches(account))
    }

    /// Index of the account to hand out next, if any is eligible.
    pub fn select(&self, accounts: &[Account], max_failures: u32) -> Option<usize> {
        accounts
            .iter()
            .enumerate()
            .filter(|(_, a)| self.is_eligible(a, max_failures))
            .min_by(|(_, a), (_, b)| self.compare(a, b))
            .map(|(i, _)| i)
    }

    /// Sort the whole working set into policy order.
    pub fn order(&self, accounts: &mut [Account]) {
        accounts.sort_by(|a, b| self.compare(a, b));
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
