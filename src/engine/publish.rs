//! engine::publish
//!
//! Commit creation and ref advancement.
//!
//! ```text
//! [no ref]        --create(ok)-------> [ref@commit]
//! [no ref]        --create(conflict)-> Conflict { CreateRef }  (cycle retries once)
//! [ref@commit A]  --update(ok)-------> [ref@commit B]
//! [ref@commit A]  --update(conflict)-> Conflict { UpdateRef }  (fatal)
//! ```

use tracing::debug;

use super::deadline::Deadline;
use super::error::{Phase, PublishError};
use crate::core::types::{BranchName, Oid};
use crate::store::{CreateCommitRequest, ObjectStore, UpdateRefRequest};

/// Create the commit described by `request` and point `branch` at it.
///
/// A request without parents is a genesis commit and creates the branch;
/// otherwise the branch is moved from the first parent to the new commit.
pub async fn publish(
    store: &dyn ObjectStore,
    branch: &BranchName,
    request: CreateCommitRequest,
    deadline: &Deadline,
) -> Result<Oid, PublishError> {
    let parent = request.parents.first().cloned();

    let commit = deadline
        .run(Phase::CreateCommit, store.create_commit(request))
        .await?;
    debug!(commit = %commit.short(7), genesis = parent.is_none(), "created commit");

    match parent {
        Some(expected) => {
            deadline
                .run(
                    Phase::UpdateRef,
                    store.update_ref(
                        branch,
                        UpdateRefRequest {
                            new: commit.clone(),
                            expected,
                        },
                    ),
                )
                .await?
        }
        None => {
            deadline
                .run(Phase::CreateRef, store.create_ref(branch, &commit))
                .await?
        }
    }
    debug!(branch = %branch, commit = %commit.short(7), "advanced branch");

    Ok(commit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::StagePath;
    use crate::store::mock::MockStore;
    use crate::store::{BlobContent, CreateTreeRequest, TreeEntry};

    async fn tree_with(store: &MockStore, path: &str, content: &[u8]) -> Oid {
        let blob = store
            .create_blob(BlobContent::new(content.to_vec()))
            .await
            .unwrap();
        store
            .create_tree(CreateTreeRequest {
                base_tree: None,
                entries: vec![TreeEntry::file(&StagePath::new(path).unwrap(), blob)],
            })
            .await
            .unwrap()
    }

    fn request(tree: Oid, parents: Vec<Oid>) -> CreateCommitRequest {
        CreateCommitRequest {
            message: "msg".to_string(),
            tree,
            parents,
            author: None,
        }
    }

    #[tokio::test]
    async fn genesis_creates_ref() {
        let store = MockStore::new();
        let main = BranchName::new("main").unwrap();
        let tree = tree_with(&store, "a.txt", b"a").await;

        let commit = publish(&store, &main, request(tree, vec![]), &Deadline::none())
            .await
            .unwrap();
        assert_eq!(store.head(&main), Some(commit.clone()));
        assert!(store.commit(&commit).unwrap().parents.is_empty());
    }

    #[tokio::test]
    async fn genesis_on_existing_branch_is_create_ref_conflict() {
        let store = MockStore::new();
        let main = BranchName::new("main").unwrap();
        store.seed(&main, &[("x", b"x".as_slice())], "seed");
        let tree = tree_with(&store, "a.txt", b"a").await;

        let err = publish(&store, &main, request(tree, vec![]), &Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PublishError::Conflict {
                phase: Phase::CreateRef,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn stale_parent_is_update_ref_conflict() {
        let store = MockStore::new();
        let main = BranchName::new("main").unwrap();
        let c1 = store.seed(&main, &[("x", b"1".as_slice())], "one");
        let c2 = store.seed(&main, &[("x", b"2".as_slice())], "two");
        let tree = tree_with(&store, "a.txt", b"a").await;

        let err = publish(&store, &main, request(tree, vec![c1]), &Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PublishError::Conflict {
                phase: Phase::UpdateRef,
                ..
            }
        ));
        assert_eq!(store.head(&main), Some(c2));
    }
}
