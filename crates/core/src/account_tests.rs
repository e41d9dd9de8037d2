// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn account_from_record_starts_available() {
    let record = AccountRecord::new("a").with_field("packs", 5);
    let account = Account::from_record(record, 42);
    assert_eq!(account.state, AccountState::Available);
    assert_eq!(account.failures, 0);
    assert_eq!(account.discovered_ms, 42);
    assert_eq!(account.field("packs"), Some(5));
    assert_eq!(account.field("gems"), None);
    assert!(account.is_available());
}

#[test]
fn record_deserializes_without_fields() {
    let record: AccountRecord = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
    assert_eq!(record.id, "x");
    assert!(record.fields.is_empty());
}

#[yare::parameterized(
    released  = { ReturnOutcome::Released,           "released" },
    succeeded = { ReturnOutcome::Succeeded,          "succeeded" },
    failed    = { ReturnOutcome::failed("timeout"),  "failed" },
)]
fn outcome_names(outcome: ReturnOutcome, name: &str) {
    assert_eq!(outcome.name(), name);
}

#[test]
fn failed_outcome_serializes_reason() {
    let value = serde_json::to_value(ReturnOutcome::failed("banned")).unwrap();
    assert_eq!(value["outcome"], "failed");
    assert_eq!(value["reason"], "banned");
}
