//! engine
//!
//! The publish engine: turns a batch of dirty staged files into exactly one
//! new commit on the remote branch.
//!
//! # Architecture
//!
//! ```text
//! ChangeSet.snapshot -> read_staged -> resolve_base -> build_tree -> publish
//!                    -> commit log -> ChangeSet.clear(snapshot)
//! ```
//!
//! - [`resolve`]: branch head lookup, `Empty` for a fresh repository
//! - [`tree`]: local reads, blob upload, one layered tree
//! - [`publish`]: commit creation and ref advancement
//! - [`cycle`]: the orchestrator, with the genesis retry
//! - [`diff`]: local staging area vs. remote head
//! - [`remote`]: health check, history walk, and pulling the head tree
//!
//! # Invariants
//!
//! - A cycle is strictly sequential; every store call awaits the previous one
//! - One [`Deadline`] bounds all store calls of a cycle
//! - Nothing is cleared from the change set unless the branch moved
//! - The engine takes no lock; callers serialize cycles per branch

pub mod cycle;
pub mod deadline;
pub mod diff;
pub mod error;
pub mod publish;
pub mod remote;
pub mod resolve;
pub mod tree;

pub use cycle::{preview, PublishCycle, PublishOutcome, PublishPreview, PublishReport};
pub use deadline::Deadline;
pub use diff::{diff_remote, DiffError, RemoteDiff};
pub use error::{ErrorKind, Phase, PublishError};
pub use remote::{
    check_health, history, pull, HealthReport, HistoryEntry, PullError, PullReport,
};
pub use resolve::{resolve_base, BaseSnapshot};
pub use tree::{build_tree, read_staged, BuiltTree, StagedFile, StagedFiles};
