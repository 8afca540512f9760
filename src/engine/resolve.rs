//! engine::resolve
//!
//! Snapshot resolution: find the commit and tree the next commit builds on.
//!
//! # Rules
//!
//! - Branch missing => [`BaseSnapshot::Empty`]. This is the expected state
//!   of a fresh repository, not an error.
//! - Branch present => its commit must be readable. A branch pointing at a
//!   commit the store cannot find is [`PublishError::Inconsistent`]; it never
//!   degrades to `Empty`, which would publish a parentless commit over
//!   existing history.

use tracing::debug;

use super::deadline::Deadline;
use super::error::{Phase, PublishError};
use crate::core::types::{BranchName, Oid};
use crate::store::{ObjectStore, StoreError};

/// The state of the branch a cycle builds on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseSnapshot {
    /// The branch does not exist yet.
    Empty,
    /// The branch points at `commit`, whose root tree is `tree`.
    Head { commit: Oid, tree: Oid },
}

impl BaseSnapshot {
    /// Commit the next commit should name as parent.
    pub fn parent(&self) -> Option<&Oid> {
        match self {
            BaseSnapshot::Empty => None,
            BaseSnapshot::Head { commit, .. } => Some(commit),
        }
    }

    /// Tree new entries are layered on.
    pub fn tree(&self) -> Option<&Oid> {
        match self {
            BaseSnapshot::Empty => None,
            BaseSnapshot::Head { tree, .. } => Some(tree),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, BaseSnapshot::Empty)
    }
}

/// Resolve the current head of `branch`.
pub async fn resolve_base(
    store: &dyn ObjectStore,
    branch: &BranchName,
    deadline: &Deadline,
) -> Result<BaseSnapshot, PublishError> {
    let Some(commit) = deadline.run(Phase::Resolve, store.get_ref(branch)).await? else {
        debug!(branch = %branch, "branch does not exist, publishing genesis commit");
        return Ok(BaseSnapshot::Empty);
    };

    match deadline
        .bound(Phase::Resolve, store.get_commit(&commit))
        .await?
    {
        Ok(info) => {
            debug!(commit = %commit.short(7), tree = %info.tree.short(7), "resolved base");
            Ok(BaseSnapshot::Head {
                commit,
                tree: info.tree,
            })
        }
        Err(StoreError::NotFound(message)) => Err(PublishError::Inconsistent(format!(
            "{} points at {} but that commit cannot be read: {}",
            branch,
            commit.short(7),
            message
        ))),
        Err(e) => Err(PublishError::from_store(Phase::Resolve, e)),
    }
}
