//! core::ops::commit_log
//!
//! Append-only audit log of published commits.
//!
//! # Format
//!
//! One human-readable line per successful publish:
//!
//! ```text
//! 2024-05-01T12:30:00.000Z - Committed changes: update a - Files: a.txt, b.txt - Commit: 1a2b3c4
//! ```
//!
//! Line breaks inside the message are folded to spaces so one publish always
//! occupies exactly one line.
//!
//! # Invariants
//!
//! - Entries are only ever appended, never rewritten or removed
//! - Each append is fsync'd before returning
//! - Insertion order is preserved

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{Oid, StagePath, UtcTimestamp};

/// Errors from commit log operations.
#[derive(Debug, Error)]
pub enum CommitLogError {
    #[error("commit log i/o error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One published commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: UtcTimestamp,
    pub message: String,
    pub files: Vec<StagePath>,
    pub commit: Option<Oid>,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(message: impl Into<String>, files: Vec<StagePath>, commit: Option<Oid>) -> Self {
        Self {
            timestamp: UtcTimestamp::now(),
            message: message.into(),
            files,
            commit,
        }
    }

    /// Render the entry as a single log line (without trailing newline).
    pub fn to_line(&self) -> String {
        let message: String = self
            .message
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        let files = self
            .files
            .iter()
            .map(StagePath::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        let mut line = format!(
            "{} - Committed changes: {} - Files: {}",
            self.timestamp, message, files
        );
        if let Some(commit) = &self.commit {
            line.push_str(&format!(" - Commit: {}", commit.short(7)));
        }
        line
    }
}

/// Destination for commit log entries.
pub trait LogSink: Send + Sync {
    /// Append one entry.
    fn append(&self, entry: &LogEntry) -> Result<(), CommitLogError>;
}

/// File-backed commit log.
#[derive(Debug, Clone)]
pub struct CommitLog {
    path: PathBuf,
}

impl CommitLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return up to `lines` entries, newest first.
    ///
    /// With `search`, only lines containing it are kept; the filter applies
    /// to the newest `lines` entries. A missing log yields no entries.
    pub fn tail(&self, lines: usize, search: Option<&str>) -> Result<Vec<String>, CommitLogError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| self.io(e))?;
        let mut entries: Vec<String> = content
            .lines()
            .filter(|l| !l.is_empty())
            .rev()
            .take(lines)
            .map(str::to_string)
            .collect();

        if let Some(needle) = search {
            entries.retain(|l| l.contains(needle));
        }
        Ok(entries)
    }

    fn io(&self, source: std::io::Error) -> CommitLogError {
        CommitLogError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl LogSink for CommitLog {
    fn append(&self, entry: &LogEntry) -> Result<(), CommitLogError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| self.io(e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io(e))?;

        let mut line = entry.to_line();
        line.push('\n');
        file.write_all(line.as_bytes()).map_err(|e| self.io(e))?;
        file.sync_all().map_err(|e| self.io(e))?;

        Ok(())
    }
}
