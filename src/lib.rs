//! stagepush - publish a staged file set as one atomic commit
//!
//! stagepush keeps a local staging area and, on request, publishes every
//! file changed since the last publish as a single commit on one remote
//! branch. It needs no local clone and no `git` binary: everything goes
//! through a content-addressable object-store API (blobs, trees, commits,
//! refs).
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - The publish cycle: resolve, build tree, commit, advance ref
//! - [`store`] - Object store abstraction, GitHub client and in-memory mock
//! - [`core`] - Domain types, change set, staging area, config, bookkeeping
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! 1. One publish cycle creates at most one commit
//! 2. The branch only ever moves forward from the head the cycle resolved
//! 3. Dirty paths are cleared only after the branch moved, and only the
//!    paths that were not written again during the cycle
//! 4. Unchanged files of the previous commit are carried over untouched

pub mod cli;
pub mod core;
pub mod engine;
pub mod store;
pub mod ui;
