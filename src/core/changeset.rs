//! core::changeset
//!
//! The change set tracker: which staged paths are dirty since the last
//! successful publish.
//!
//! # Semantics
//!
//! - [`ChangeSet::mark_dirty`] inserts a path unconditionally. Marking a path
//!   that is already dirty does not change membership.
//! - [`ChangeSet::snapshot`] copies the current set without clearing it.
//! - [`ChangeSet::clear`] removes exactly the paths of a snapshot, and only
//!   those that were not marked again after the snapshot was taken.
//!
//! A path staged while a publish cycle is in flight therefore survives the
//! cycle's clear, even if the same path was part of the cycle: its newer
//! content has not been published yet.
//!
//! The tracker never touches storage on its own. [`ChangeSet::load`] and
//! [`ChangeSet::save`] persist the membership between CLI processes.
//!
//! # Example
//!
//! ```
//! use stagepush::core::changeset::ChangeSet;
//! use stagepush::core::types::StagePath;
//!
//! let tracker = ChangeSet::new();
//! let a = StagePath::new("a.txt").unwrap();
//! tracker.mark_dirty(a.clone());
//!
//! let snapshot = tracker.snapshot();
//! tracker.mark_dirty(StagePath::new("b.txt").unwrap());
//!
//! tracker.clear(&snapshot);
//! assert!(!tracker.contains(&a));
//! assert_eq!(tracker.len(), 1);
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::StagePath;

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

/// Errors from persisting the change set.
#[derive(Debug, Error)]
pub enum ChangeSetError {
    #[error("change set i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("change set json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported change set version {0}")]
    UnsupportedVersion(u32),
}

/// Set of dirty staged paths.
///
/// Cheap to clone; clones share state, so a staging area and a publish cycle
/// can hold the same tracker.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Dirty paths mapped to the mark at which they were last made dirty.
    paths: BTreeMap<StagePath, u64>,
    /// Monotonic mark counter.
    mark: u64,
}

/// A point-in-time copy of the change set, taken by a publish cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSnapshot {
    /// Sorted by path.
    entries: Vec<(StagePath, u64)>,
}

impl ChangeSnapshot {
    /// Paths in the snapshot, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &StagePath> {
        self.entries.iter().map(|(p, _)| p)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &StagePath) -> bool {
        self.entries.iter().any(|(p, _)| p == path)
    }
}

/// On-disk representation.
#[derive(Debug, Serialize, Deserialize)]
struct ChangeSetFile {
    version: u32,
    paths: Vec<StagePath>,
}

impl ChangeSet {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker already holding `paths`.
    pub fn from_paths(paths: impl IntoIterator<Item = StagePath>) -> Self {
        let tracker = Self::new();
        for path in paths {
            tracker.mark_dirty(path);
        }
        tracker
    }

    /// Mark a path dirty.
    ///
    /// Returns `true` if the path was not dirty before.
    pub fn mark_dirty(&self, path: StagePath) -> bool {
        let mut inner = self.inner.lock();
        inner.mark += 1;
        let mark = inner.mark;
        inner.paths.insert(path, mark).is_none()
    }

    /// Copy the current set. The tracker is not modified.
    pub fn snapshot(&self) -> ChangeSnapshot {
        let inner = self.inner.lock();
        ChangeSnapshot {
            entries: inner
                .paths
                .iter()
                .map(|(p, mark)| (p.clone(), *mark))
                .collect(),
        }
    }

    /// Remove the snapshot's paths that have not been marked since.
    ///
    /// Returns the number of paths removed.
    pub fn clear(&self, snapshot: &ChangeSnapshot) -> usize {
        self.remove_unchanged(snapshot.entries.iter())
    }

    /// Like [`clear`](Self::clear), restricted to `paths` within the snapshot.
    pub fn clear_only(&self, snapshot: &ChangeSnapshot, paths: &[StagePath]) -> usize {
        self.remove_unchanged(
            snapshot
                .entries
                .iter()
                .filter(|(p, _)| paths.contains(p)),
        )
    }

    fn remove_unchanged<'a>(&self, entries: impl Iterator<Item = &'a (StagePath, u64)>) -> usize {
        let mut inner = self.inner.lock();
        let mut removed = 0;
        for (path, mark) in entries {
            if inner.paths.get(path) == Some(mark) {
                inner.paths.remove(path);
                removed += 1;
            }
        }
        removed
    }

    /// Current dirty paths, sorted.
    pub fn paths(&self) -> Vec<StagePath> {
        self.inner.lock().paths.keys().cloned().collect()
    }

    pub fn contains(&self, path: &StagePath) -> bool {
        self.inner.lock().paths.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().paths.is_empty()
    }

    /// Load a persisted change set. A missing file yields an empty tracker.
    pub fn load(path: &Path) -> Result<Self, ChangeSetError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let file: ChangeSetFile = serde_json::from_str(&content)?;
        if file.version != FORMAT_VERSION {
            return Err(ChangeSetError::UnsupportedVersion(file.version));
        }
        Ok(Self::from_paths(file.paths))
    }

    /// Persist the current membership.
    ///
    /// Writes to a temp file, fsyncs it and renames it over `path`, so a
    /// crash leaves either the old or the new set on disk.
    pub fn save(&self, path: &Path) -> Result<(), ChangeSetError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let file = ChangeSetFile {
            version: FORMAT_VERSION,
            paths: self.paths(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        let temp_path = path.with_extension("json.tmp");
        let mut handle = File::create(&temp_path)?;
        handle.write_all(content.as_bytes())?;
        handle.sync_all()?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }
}
