//! core::paths
//!
//! Centralized path routing for stagepush storage locations.
//!
//! # Storage Layout
//!
//! A workspace is a directory holding the staging area and a state
//! directory:
//! - `<root>/<staging.dir>/` - Staged files (default `public/`)
//! - `<root>/.stagepush/config.toml` - Workspace configuration
//! - `<root>/.stagepush/lock` - Exclusive lock file
//! - `<root>/.stagepush/dirty.json` - Persisted change set
//! - `<root>/.stagepush/logs/commits.log` - Append-only commit log
//!
//! **Hard rule:** No code outside this module computes `.stagepush` paths.
//!
//! # Example
//!
//! ```
//! use stagepush::core::paths::StagePaths;
//! use std::path::PathBuf;
//!
//! let paths = StagePaths::new(PathBuf::from("/site"), "public");
//!
//! assert_eq!(paths.staging_dir(), PathBuf::from("/site/public"));
//! assert_eq!(paths.config_path(), PathBuf::from("/site/.stagepush/config.toml"));
//! assert_eq!(paths.commit_log_path(), PathBuf::from("/site/.stagepush/logs/commits.log"));
//! ```

use std::path::{Path, PathBuf};

/// Name of the state directory under the workspace root.
pub const STATE_DIR_NAME: &str = ".stagepush";

/// Centralized path routing for a stagepush workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePaths {
    /// Workspace root.
    pub root: PathBuf,

    /// Staging directory, relative to the root.
    staging: PathBuf,
}

impl StagePaths {
    /// Create paths for a workspace rooted at `root` with the given
    /// staging directory (relative to `root`).
    pub fn new(root: PathBuf, staging: impl AsRef<Path>) -> Self {
        Self {
            root,
            staging: staging.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the staged files.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(&self.staging)
    }

    /// Directory holding all stagepush state.
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR_NAME)
    }

    /// Workspace configuration file.
    ///
    /// This is `<root>/.stagepush/config.toml`.
    pub fn config_path(&self) -> PathBuf {
        Self::config_path_for(&self.root)
    }

    /// Workspace configuration file for an arbitrary root.
    ///
    /// Used while loading configuration, before the staging directory is known.
    pub fn config_path_for(root: &Path) -> PathBuf {
        root.join(STATE_DIR_NAME).join("config.toml")
    }

    /// Exclusive lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("lock")
    }

    /// Persisted change set.
    pub fn changeset_path(&self) -> PathBuf {
        self.state_dir().join("dirty.json")
    }

    /// Directory for logs.
    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir().join("logs")
    }

    /// Append-only commit log.
    pub fn commit_log_path(&self) -> PathBuf {
        self.logs_dir().join("commits.log")
    }
}
