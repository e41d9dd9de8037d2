// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream sources a pool derives its working set from.

use crate::error::SourceError;
use fleet_core::{AccountId, AccountRecord};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What one `load` found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSnapshot {
    pub records: Vec<AccountRecord>,
    /// Accounts the source still lists but could not read this time, such
    /// as a file caught mid-write. The pool keeps what it knew of them.
    pub unreadable: Vec<AccountId>,
}

impl From<Vec<AccountRecord>> for SourceSnapshot {
    fn from(records: Vec<AccountRecord>) -> Self {
        Self {
            records,
            unreadable: Vec::new(),
        }
    }
}

/// Source of truth for which accounts exist.
///
/// `load` is called on every refresh and must return the complete current
/// set; the pool does the merging.
pub trait AccountSource: Send + Sync + 'static {
    fn load(&self) -> Result<SourceSnapshot, SourceError>;

    /// Short description for logs.
    fn describe(&self) -> String;

    /// Directory whose changes should trigger a refresh, for file-backed sources.
    fn watch_path(&self) -> Option<&Path> {
        None
    }
}

/// In-memory source. Clones share the same record list.
#[derive(Clone, Default)]
pub struct StaticSource {
    records: Arc<Mutex<Vec<AccountRecord>>>,
}

impl StaticSource {
    pub fn new(records: Vec<AccountRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    /// Replace the whole record list.
    pub fn set(&self, records: Vec<AccountRecord>) {
        *self.records.lock() = records;
    }

    pub fn push(&self, record: AccountRecord) {
        self.records.lock().push(record);
    }

    pub fn remove(&self, id: &str) {
        self.records.lock().retain(|r| r.id != id);
    }
}

impl AccountSource for StaticSource {
    fn load(&self) -> Result<SourceSnapshot, SourceError> {
        Ok(self.records.lock().clone().into())
    }

    fn describe(&self) -> String {
        format!("static ({} records)", self.records.lock().len())
    }
}

/// One JSON file per account in a directory.
///
/// The account id is the file's `id` string if present, otherwise the file
/// stem. Integer-valued top-level keys become sortable fields; booleans
/// count as 0/1. A file that fails to parse is reported as unreadable under
/// the id it last parsed to (or its stem), so the pool neither drops nor
/// resets that account.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    /// Id each file last parsed to.
    known: Arc<Mutex<HashMap<PathBuf, AccountId>>>,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            known: Arc::default(),
        }
    }

    fn fallback_id(&self, path: &Path) -> Option<AccountId> {
        self.known.lock().get(path).cloned().or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(AccountId::new)
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn parse_file(path: &Path) -> Result<AccountRecord, SourceError> {
        let content = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| SourceError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let object = value.as_object().ok_or_else(|| SourceError::Parse {
            path: path.to_path_buf(),
            message: "expected a JSON object".to_string(),
        })?;

        let id = match object.get("id").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .ok_or_else(|| SourceError::Parse {
                    path: path.to_path_buf(),
                    message: "cannot derive account id from file name".to_string(),
                })?,
        };

        let fields: BTreeMap<String, i64> = object
            .iter()
            .filter_map(|(key, v)| {
                let n = v.as_i64().or_else(|| v.as_bool().map(i64::from))?;
                Some((key.clone(), n))
            })
            .collect();

        Ok(AccountRecord {
            id: AccountId::new(id),
            fields,
        })
    }
}

impl AccountSource for DirectorySource {
    fn load(&self) -> Result<SourceSnapshot, SourceError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| SourceError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut snapshot = SourceSnapshot {
            records: Vec::with_capacity(paths.len()),
            unreadable: Vec::new(),
        };
        let mut known = HashMap::with_capacity(paths.len());
        for path in paths {
            match Self::parse_file(&path) {
                Ok(record) => {
                    known.insert(path, record.id.clone());
                    snapshot.records.push(record);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "account file unreadable, keeping previous state");
                    if let Some(id) = self.fallback_id(&path) {
                        known.insert(path, id.clone());
                        snapshot.unreadable.push(id);
                    }
                }
            }
        }
        *self.known.lock() = known;
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }

    fn watch_path(&self) -> Option<&Path> {
        Some(&self.dir)
    }
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod tests;
