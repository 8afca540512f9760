//! engine::diff
//!
//! Compare the local staging area with the remote head tree.
//!
//! Files are compared by git blob id. The local id is computed with the
//! same SHA-1 the store uses, so no content is downloaded.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use super::deadline::Deadline;
use super::error::{Phase, PublishError};
use super::resolve::resolve_base;
use crate::core::changeset::ChangeSet;
use crate::core::staging::{FileReader, StagingArea, StagingError};
use crate::core::types::{BranchName, Oid, StagePath};
use crate::store::{ObjectKind, ObjectStore};

/// Errors from computing a diff.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error(transparent)]
    Remote(#[from] PublishError),

    #[error(transparent)]
    Staging(#[from] StagingError),
}

/// Differences between the staging area and the branch head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteDiff {
    /// Branch head compared against; `None` for an empty repository
    pub head: Option<Oid>,
    /// Present locally only
    pub added: Vec<String>,
    /// Present remotely only
    pub deleted: Vec<String>,
    /// Present on both sides with different content
    pub modified: Vec<String>,
    /// Content of the change set
    pub dirty: Vec<StagePath>,
}

impl RemoteDiff {
    /// Whether local and remote content are identical.
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

/// Diff the staging area against the head of `branch`.
pub async fn diff_remote(
    store: &dyn ObjectStore,
    branch: &BranchName,
    staging: &StagingArea,
    tracker: &ChangeSet,
    deadline: &Deadline,
) -> Result<RemoteDiff, DiffError> {
    let base = resolve_base(store, branch, deadline).await?;

    let remote: BTreeMap<String, Oid> = match base.tree() {
        Some(tree) => deadline
            .run(Phase::ListTree, store.get_tree(tree))
            .await?
            .into_iter()
            .filter(|e| e.kind == ObjectKind::Blob)
            .map(|e| (e.path, e.oid))
            .collect(),
        None => BTreeMap::new(),
    };

    let local = local_blob_ids(&staging.list(None, None)?, staging)?;

    let mut diff = RemoteDiff {
        head: base.parent().cloned(),
        dirty: tracker.paths(),
        ..Default::default()
    };

    for (path, oid) in &local {
        match remote.get(path) {
            None => diff.added.push(path.clone()),
            Some(remote_oid) if remote_oid != oid => diff.modified.push(path.clone()),
            Some(_) => {}
        }
    }
    diff.deleted = remote
        .keys()
        .filter(|path| !local.contains_key(*path))
        .cloned()
        .collect();

    debug!(
        added = diff.added.len(),
        deleted = diff.deleted.len(),
        modified = diff.modified.len(),
        "computed remote diff"
    );
    Ok(diff)
}

/// Git blob ids of the listed files. A file removed since it was listed
/// counts as absent.
fn local_blob_ids(
    paths: &[StagePath],
    reader: &dyn FileReader,
) -> Result<BTreeMap<String, Oid>, PublishError> {
    let mut local = BTreeMap::new();
    for path in paths {
        let content = reader.read(path).map_err(|source| PublishError::Read {
            path: path.clone(),
            source,
        })?;
        if let Some(content) = content {
            local.insert(path.as_str().to_string(), Oid::for_blob(&content));
        }
    }
    Ok(local)
}
