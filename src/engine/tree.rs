//! engine::tree
//!
//! Tree building: turn the dirty paths into one new tree.
//!
//! Building happens in two steps. [`read_staged`] reads every dirty path
//! locally, before any store call, and applies the missing-file policy.
//! [`build_tree`] then uploads one blob per file and creates the tree in a
//! single call, so a reader of the resulting commit sees every file change
//! or none.

use tracing::{debug, warn};

use super::deadline::Deadline;
use super::error::{Phase, PublishError};
use crate::core::changeset::ChangeSnapshot;
use crate::core::config::MissingFilePolicy;
use crate::core::staging::FileReader;
use crate::core::types::{Oid, StagePath};
use crate::store::{BlobContent, CreateTreeRequest, ObjectStore, TreeEntry};

/// A dirty file with the bytes read for this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: StagePath,
    pub content: Vec<u8>,
}

/// Result of reading the dirty paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedFiles {
    /// Files to publish, sorted by path
    pub files: Vec<StagedFile>,
    /// Dirty paths whose file no longer exists
    pub skipped: Vec<StagePath>,
}

impl StagedFiles {
    pub fn paths(&self) -> Vec<StagePath> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A tree created on the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltTree {
    pub tree: Oid,
    /// Entries submitted, sorted by path
    pub entries: Vec<TreeEntry>,
}

/// Read the bytes of every path in `snapshot`.
///
/// # Errors
///
/// - [`PublishError::MissingFile`] for a vanished path under
///   [`MissingFilePolicy::Fail`]
/// - [`PublishError::Read`] when a file exists but cannot be read
pub fn read_staged(
    snapshot: &ChangeSnapshot,
    reader: &dyn FileReader,
    policy: MissingFilePolicy,
) -> Result<StagedFiles, PublishError> {
    let mut staged = StagedFiles::default();

    for path in snapshot.paths() {
        let content = reader.read(path).map_err(|source| PublishError::Read {
            path: path.clone(),
            source,
        })?;

        match content {
            Some(content) => staged.files.push(StagedFile {
                path: path.clone(),
                content,
            }),
            None if policy == MissingFilePolicy::Fail => {
                return Err(PublishError::MissingFile { path: path.clone() });
            }
            None => {
                warn!(path = %path, "staged file vanished, leaving it out of the commit");
                staged.skipped.push(path.clone());
            }
        }
    }

    staged.files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(staged)
}

/// Upload `staged` and create one tree layered on `base_tree`.
///
/// Returns `None` without calling the store when there is nothing to upload.
pub async fn build_tree(
    store: &dyn ObjectStore,
    base_tree: Option<&Oid>,
    staged: &StagedFiles,
    deadline: &Deadline,
) -> Result<Option<BuiltTree>, PublishError> {
    if staged.is_empty() {
        return Ok(None);
    }

    let mut entries = Vec::with_capacity(staged.files.len());
    for file in &staged.files {
        let blob = deadline
            .run(
                Phase::CreateBlobs,
                store.create_blob(BlobContent::new(file.content.clone())),
            )
            .await?;
        debug!(path = %file.path, blob = %blob.short(7), "uploaded blob");
        entries.push(TreeEntry::file(&file.path, blob));
    }

    let tree = deadline
        .run(
            Phase::CreateTree,
            store.create_tree(CreateTreeRequest {
                base_tree: base_tree.cloned(),
                entries: entries.clone(),
            }),
        )
        .await?;
    debug!(
        tree = %tree.short(7),
        entries = entries.len(),
        layered = base_tree.is_some(),
        "created tree"
    );

    Ok(Some(BuiltTree { tree, entries }))
}
