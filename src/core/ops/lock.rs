//! core::ops::lock
//!
//! Exclusive workspace lock for publish cycles and staging mutations.
//!
//! # Architecture
//!
//! The publish engine performs no internal locking: a second cycle must not
//! start while a first one is still creating objects, or both would resolve
//! the same base snapshot and race at the ref step. The lock is how callers
//! in separate processes serialize cycles against one workspace.
//!
//! # Invariants
//!
//! - Lock must be held for the entire publish cycle
//! - Lock is automatically released on drop (RAII pattern)
//! - Lock acquisition is non-blocking (fails fast if locked)
//!
//! # Example
//!
//! ```
//! use stagepush::core::ops::lock::{StageLock, LockError};
//! use stagepush::core::paths::StagePaths;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let paths = StagePaths::new(dir.path().to_path_buf(), "public");
//!
//! let lock = StageLock::acquire(&paths).unwrap();
//! assert!(matches!(StageLock::acquire(&paths), Err(LockError::AlreadyLocked)));
//! drop(lock);
//! assert!(StageLock::acquire(&paths).is_ok());
//! ```

use std::fs::{self, File, OpenOptions};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::StagePaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("workspace is locked by another stagepush process")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),
}

/// An exclusive lock on a workspace.
///
/// The lock is released when this guard is dropped.
#[derive(Debug)]
pub struct StageLock {
    /// Open handle holding the OS lock
    file: File,
}

impl StageLock {
    /// Attempt to acquire the workspace lock.
    ///
    /// Uses OS-level file locking via `fs2`, which works across processes.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &StagePaths) -> Result<Self, LockError> {
        let state_dir = paths.state_dir();
        fs::create_dir_all(&state_dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", state_dir.display(), e))
        })?;

        let path = paths.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }
}

impl Drop for StageLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
