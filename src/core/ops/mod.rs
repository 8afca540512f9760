//! core::ops
//!
//! Cross-cycle bookkeeping: locking and the commit log.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive workspace lock
//! - [`commit_log`] - Append-only log of published commits
//!
//! # Architecture
//!
//! Every command that can publish:
//! 1. Acquires the exclusive workspace lock
//! 2. Runs one publish cycle
//! 3. Appends a commit log entry on success (a failure here is only a warning)
//! 4. Releases the lock on drop

pub mod commit_log;
pub mod lock;

pub use commit_log::{CommitLog, CommitLogError, LogEntry, LogSink};
pub use lock::{LockError, StageLock};
