// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;

#[test]
fn static_source_shares_records_between_clones() {
    let source = StaticSource::new(vec![AccountRecord::new("a")]);
    let other = source.clone();
    other.push(AccountRecord::new("b"));
    assert_eq!(source.load().unwrap().records.len(), 2);

    source.remove("a");
    let ids: Vec<_> = other.load().unwrap().records.into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![AccountId::new("b")]);
    assert!(other.watch_path().is_none());
}

#[test]
fn directory_source_reads_json_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("alpha.json"), r#"{"packs": 5, "name": "x", "vip": true}"#).unwrap();
    fs::write(dir.path().join("beta.json"), r#"{"id": "custom", "packs": 2}"#).unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let source = DirectorySource::new(dir.path());
    let records = source.load().unwrap().records;
    assert_eq!(records.len(), 2);

    assert_eq!(records[0].id, "alpha");
    assert_eq!(records[0].fields.get("packs"), Some(&5));
    assert_eq!(records[0].fields.get("vip"), Some(&1));
    assert!(!records[0].fields.contains_key("name"));

    assert_eq!(records[1].id, "custom");
    assert_eq!(source.watch_path(), Some(dir.path()));
}

#[test]
fn directory_source_reports_bad_files_as_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("good.json"), r#"{"packs": 1}"#).unwrap();
    fs::write(dir.path().join("broken.json"), "{not json").unwrap();
    fs::write(dir.path().join("array.json"), "[1, 2]").unwrap();

    let snapshot = DirectorySource::new(dir.path()).load().unwrap();
    assert_eq!(snapshot.records.len(), 1);
    assert_eq!(snapshot.records[0].id, "good");
    assert_eq!(
        snapshot.unreadable,
        vec![AccountId::new("array"), AccountId::new("broken")]
    );
}

#[test]
fn unreadable_file_keeps_the_id_it_last_parsed_to() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("beta.json");
    fs::write(&path, r#"{"id": "custom", "packs": 2}"#).unwrap();
    let source = DirectorySource::new(dir.path());
    assert_eq!(source.load().unwrap().records[0].id, "custom");

    fs::write(&path, r#"{"id": "cus"#).unwrap();
    let snapshot = source.load().unwrap();
    assert!(snapshot.records.is_empty());
    assert_eq!(snapshot.unreadable, vec![AccountId::new("custom")]);
}

#[test]
fn directory_source_missing_dir_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = DirectorySource::new(dir.path().join("nope"));
    assert!(matches!(source.load(), Err(SourceError::Io { .. })));
}
