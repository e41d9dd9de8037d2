// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared read-mostly catalogs.
//!
//! Catalogs are built once and shared by every worker through an `Arc`.
//! A reload builds a complete new catalog off to the side and swaps the
//! pointer; workers holding the old snapshot keep using it until their
//! run ends.

use crate::error::CatalogError;
use fleet_core::{Routine, RoutineName};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Immutable snapshot behind an atomically swappable pointer.
pub struct Registry<T> {
    current: RwLock<Arc<T>>,
    generation: AtomicU64,
}

impl<T> Registry<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
            generation: AtomicU64::new(0),
        }
    }

    /// The visible contents. Stays valid across later swaps.
    pub fn snapshot(&self) -> Arc<T> {
        Arc::clone(&self.current.read())
    }

    /// Replace the contents, returning the previous snapshot.
    pub fn swap(&self, value: T) -> Arc<T> {
        let previous = std::mem::replace(&mut *self.current.write(), Arc::new(value));
        self.generation.fetch_add(1, Ordering::SeqCst);
        previous
    }

    /// Number of swaps since creation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl<T: Default> Default for Registry<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("generation", &self.generation())
            .finish()
    }
}

/// Routines by name.
#[derive(Debug, Clone, Default)]
pub struct RoutineCatalog {
    routines: BTreeMap<RoutineName, Arc<Routine>>,
}

impl RoutineCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routine(mut self, routine: Routine) -> Self {
        self.routines.insert(routine.name.clone(), Arc::new(routine));
        self
    }

    /// Load every `*.toml` file in `dir`, one routine per file.
    ///
    /// A file without a `name` takes its file stem. Any unreadable or
    /// invalid file fails the whole load.
    pub fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for path in sorted_entries(dir)? {
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let routine = parse_routine_file(&path)?;
            if catalog.routines.contains_key(&routine.name) {
                return Err(CatalogError::Duplicate {
                    name: routine.name,
                    path,
                });
            }
            catalog.routines.insert(routine.name.clone(), Arc::new(routine));
        }
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Routine>> {
        self.routines.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routines.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &RoutineName> {
        self.routines.keys()
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}

fn parse_routine_file(path: &Path) -> Result<Routine, CatalogError> {
    let text = fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |message: String| CatalogError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let mut table: toml::Table = text.parse().map_err(|e: toml::de::Error| parse_err(e.to_string()))?;
    if !table.contains_key("name") {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| parse_err("file name is not valid UTF-8".to_string()))?;
        table.insert("name".to_string(), toml::Value::String(stem.to_string()));
    }
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| parse_err(e.to_string()))
}

const TEMPLATE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Template image files by name (file stem).
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<String, PathBuf>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.templates.insert(name.into(), path.into());
        self
    }

    /// Index every image file in `dir`.
    pub fn scan_dir(dir: &Path) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for path in sorted_entries(dir)? {
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if !is_image {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                catalog.templates.insert(stem.to_string(), path.clone());
            }
        }
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.templates.get(name).map(PathBuf::as_path)
    }

    /// Paths for the named templates that exist in the catalog.
    pub fn resolve<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> HashMap<String, PathBuf> {
        names
            .into_iter()
            .filter_map(|name| {
                self.templates
                    .get(name)
                    .map(|path| (name.to_string(), path.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    let io_err = |source| CatalogError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Where catalogs are loaded from (`[catalogs]` in the daemon config).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogPaths {
    pub routines_dir: Option<PathBuf>,
    pub templates_dir: Option<PathBuf>,
}

/// Sizes after a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSummary {
    pub routines: usize,
    pub templates: usize,
}

/// Routine and template catalogs from the same load.
#[derive(Debug, Clone, Default)]
pub struct CatalogSet {
    pub routines: Arc<RoutineCatalog>,
    pub templates: Arc<TemplateCatalog>,
}

impl CatalogSet {
    pub fn new(routines: RoutineCatalog, templates: TemplateCatalog) -> Self {
        Self {
            routines: Arc::new(routines),
            templates: Arc::new(templates),
        }
    }
}

/// The routine and template catalogs every worker shares.
#[derive(Debug, Default)]
pub struct Catalogs {
    current: Registry<CatalogSet>,
    paths: CatalogPaths,
}

impl Catalogs {
    /// In-memory catalogs with no backing directories.
    pub fn new(routines: RoutineCatalog, templates: TemplateCatalog) -> Self {
        Self {
            current: Registry::new(CatalogSet::new(routines, templates)),
            paths: CatalogPaths::default(),
        }
    }

    /// Load catalogs from disk. Missing paths yield empty catalogs.
    pub fn load(paths: CatalogPaths) -> Result<Self, CatalogError> {
        let (routines, templates) = load_from(&paths)?;
        Ok(Self {
            current: Registry::new(CatalogSet::new(routines, templates)),
            paths,
        })
    }

    /// Re-read both catalogs and swap them in as one snapshot.
    ///
    /// On error nothing is swapped and the current catalogs stay visible.
    pub fn reload(&self) -> Result<ReloadSummary, CatalogError> {
        let (routines, templates) = load_from(&self.paths)?;
        let summary = ReloadSummary {
            routines: routines.len(),
            templates: templates.len(),
        };
        self.current.swap(CatalogSet::new(routines, templates));
        tracing::info!(
            routines = summary.routines,
            templates = summary.templates,
            generation = self.current.generation(),
            "catalogs reloaded"
        );
        Ok(summary)
    }

    /// Both catalogs as of one load. Read routines and templates for a
    /// single run from the same snapshot.
    pub fn snapshot(&self) -> Arc<CatalogSet> {
        self.current.snapshot()
    }

    pub fn routines(&self) -> Arc<RoutineCatalog> {
        Arc::clone(&self.snapshot().routines)
    }

    pub fn templates(&self) -> Arc<TemplateCatalog> {
        Arc::clone(&self.snapshot().templates)
    }

    pub fn routine(&self, name: &str) -> Option<Arc<Routine>> {
        self.snapshot().routines.get(name)
    }
}

fn load_from(paths: &CatalogPaths) -> Result<(RoutineCatalog, TemplateCatalog), CatalogError> {
    let routines = match &paths.routines_dir {
        Some(dir) => RoutineCatalog::load_dir(dir)?,
        None => RoutineCatalog::new(),
    };
    let templates = match &paths.templates_dir {
        Some(dir) => TemplateCatalog::scan_dir(dir)?,
        None => TemplateCatalog::new(),
    };
    Ok((routines, templates))
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
