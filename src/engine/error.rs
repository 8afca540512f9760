//! engine::error
//!
//! Publish cycle errors, tagged with the phase that failed.

use thiserror::Error;

use crate::core::types::StagePath;
use crate::store::StoreError;

/// Step of a publish cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading the branch head and its commit
    Resolve,
    /// Reading staged file bytes
    ReadFiles,
    /// Uploading blobs
    CreateBlobs,
    /// Creating the layered tree
    CreateTree,
    /// Creating the commit object
    CreateCommit,
    /// Moving an existing branch
    UpdateRef,
    /// Creating the branch on an empty repository
    CreateRef,
    /// Listing a remote tree (diff and pull)
    ListTree,
    /// Walking remote commits
    History,
    /// Downloading blobs
    Download,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Resolve => "resolve",
            Phase::ReadFiles => "read-files",
            Phase::CreateBlobs => "create-blobs",
            Phase::CreateTree => "create-tree",
            Phase::CreateCommit => "create-commit",
            Phase::UpdateRef => "update-ref",
            Phase::CreateRef => "create-ref",
            Phase::ListTree => "list-tree",
            Phase::History => "history",
            Phase::Download => "download",
        };
        f.write_str(name)
    }
}

/// Coarse classification used to decide what a caller should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retry the whole cycle later.
    Transient,
    /// Someone else moved the branch; restart from resolution.
    Conflict,
    /// Retrying will not help without intervention.
    Fatal,
}

/// Errors from a publish cycle.
///
/// The change set is left untouched whenever one of these is returned.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("{phase} failed: {source}")]
    Store {
        phase: Phase,
        #[source]
        source: StoreError,
    },

    #[error("{phase} rejected: {message}")]
    Conflict { phase: Phase, message: String },

    #[error("{phase} did not finish before the deadline")]
    Timeout { phase: Phase },

    #[error("inconsistent remote: {0}")]
    Inconsistent(String),

    #[error("staged file no longer exists: {path}")]
    MissingFile { path: StagePath },

    #[error("cannot read staged file '{path}': {source}")]
    Read {
        path: StagePath,
        #[source]
        source: std::io::Error,
    },
}

impl PublishError {
    /// Wrap a store error, turning ref races into `Conflict`.
    pub fn from_store(phase: Phase, err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) | StoreError::AlreadyExists(message) => {
                PublishError::Conflict { phase, message }
            }
            source => PublishError::Store { phase, source },
        }
    }

    /// The phase that failed, when there is one.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            PublishError::Store { phase, .. }
            | PublishError::Conflict { phase, .. }
            | PublishError::Timeout { phase } => Some(*phase),
            PublishError::Inconsistent(_) => Some(Phase::Resolve),
            PublishError::MissingFile { .. } | PublishError::Read { .. } => Some(Phase::ReadFiles),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PublishError::Store { source, .. } if source.is_transient() => ErrorKind::Transient,
            PublishError::Timeout { .. } => ErrorKind::Transient,
            PublishError::Conflict { .. } => ErrorKind::Conflict,
            _ => ErrorKind::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_races_become_conflicts() {
        let err = PublishError::from_store(Phase::UpdateRef, StoreError::Conflict("moved".into()));
        assert!(matches!(
            err,
            PublishError::Conflict {
                phase: Phase::UpdateRef,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = PublishError::from_store(
            Phase::CreateRef,
            StoreError::AlreadyExists("exists".into()),
        );
        assert_eq!(err.phase(), Some(Phase::CreateRef));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn classification() {
        let transient = PublishError::from_store(Phase::CreateBlobs, StoreError::RateLimited);
        assert_eq!(transient.kind(), ErrorKind::Transient);

        let timeout = PublishError::Timeout {
            phase: Phase::CreateTree,
        };
        assert_eq!(timeout.kind(), ErrorKind::Transient);

        let auth = PublishError::from_store(Phase::Resolve, StoreError::AuthFailed("no".into()));
        assert_eq!(auth.kind(), ErrorKind::Fatal);

        let inconsistent = PublishError::Inconsistent("gone".into());
        assert_eq!(inconsistent.kind(), ErrorKind::Fatal);
        assert_eq!(inconsistent.phase(), Some(Phase::Resolve));
    }

    #[test]
    fn display_names_phase() {
        let err = PublishError::from_store(
            Phase::CreateCommit,
            StoreError::ApiError {
                status: 500,
                message: "boom".into(),
            },
        );
        assert_eq!(err.to_string(), "create-commit failed: API error: 500 - boom");

        let err = PublishError::Timeout {
            phase: Phase::Download,
        };
        assert_eq!(err.to_string(), "download did not finish before the deadline");
    }
}
