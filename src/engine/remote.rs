//! engine::remote
//!
//! Read-only views of the remote branch: health check, commit history, and
//! pulling the head tree into the staging area.
//!
//! # Pull rules
//!
//! - Dirty paths are never overwritten; local edits win until published
//! - Files whose content already matches the head are not downloaded
//! - Pulled files are written clean, so they are not republished
//! - Local files missing from the head are left alone
//! - Only regular and executable blobs are pulled; links and submodules are
//!   reported as skipped

use thiserror::Error;
use tracing::{debug, warn};

use super::deadline::Deadline;
use super::error::{Phase, PublishError};
use super::resolve::{resolve_base, BaseSnapshot};
use crate::core::staging::{FileReader, StagingArea, StagingError};
use crate::core::types::{BranchName, Oid, StagePath};
use crate::store::{FileMode, ObjectKind, ObjectStore};

/// Result of a health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Store implementation name
    pub store: &'static str,
    pub branch: BranchName,
    /// Branch head; `None` when the branch does not exist yet
    pub head: Option<Oid>,
}

/// Check that the store is reachable, the credentials work, and the branch
/// head (if any) is readable.
pub async fn check_health(
    store: &dyn ObjectStore,
    branch: &BranchName,
    deadline: &Deadline,
) -> Result<HealthReport, PublishError> {
    let base = resolve_base(store, branch, deadline).await?;
    Ok(HealthReport {
        store: store.name(),
        branch: branch.clone(),
        head: base.parent().cloned(),
    })
}

/// One commit of the branch history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub commit: Oid,
    pub message: String,
    pub parents: Vec<Oid>,
}

/// Walk first parents from the head of `branch`, newest first.
///
/// Stops after `limit` commits; `0` walks to the root. A missing branch has
/// no history.
pub async fn history(
    store: &dyn ObjectStore,
    branch: &BranchName,
    limit: usize,
    deadline: &Deadline,
) -> Result<Vec<HistoryEntry>, PublishError> {
    let mut next = deadline.run(Phase::History, store.get_ref(branch)).await?;
    let mut entries = Vec::new();

    while let Some(commit) = next {
        if limit != 0 && entries.len() >= limit {
            break;
        }
        let info = deadline
            .run(Phase::History, store.get_commit(&commit))
            .await?;
        next = info.parents.first().cloned();
        entries.push(HistoryEntry {
            commit,
            message: info.message,
            parents: info.parents,
        });
    }

    debug!(branch = %branch, count = entries.len(), "read history");
    Ok(entries)
}

/// Errors from pulling the branch head.
#[derive(Debug, Error)]
pub enum PullError {
    #[error(transparent)]
    Remote(#[from] PublishError),

    #[error(transparent)]
    Staging(#[from] StagingError),
}

/// What a pull did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Head pulled from; `None` for an empty repository
    pub head: Option<Oid>,
    /// Downloaded and written
    pub written: Vec<StagePath>,
    /// Already identical locally
    pub unchanged: usize,
    /// Dirty locally, left untouched
    pub kept: Vec<StagePath>,
    /// Remote entries not representable as staged files
    pub skipped: Vec<String>,
}

/// Bring the staging area up to date with the head of `branch`.
pub async fn pull(
    store: &dyn ObjectStore,
    branch: &BranchName,
    staging: &StagingArea,
    deadline: &Deadline,
) -> Result<PullReport, PullError> {
    let base = resolve_base(store, branch, deadline).await?;
    let BaseSnapshot::Head { commit, tree } = base else {
        debug!(branch = %branch, "branch does not exist, nothing to pull");
        return Ok(PullReport::default());
    };

    let entries = deadline.run(Phase::ListTree, store.get_tree(&tree)).await?;
    let mut report = PullReport {
        head: Some(commit),
        ..Default::default()
    };

    for entry in entries {
        if entry.kind != ObjectKind::Blob {
            continue;
        }
        if !matches!(entry.mode, FileMode::Regular | FileMode::Executable) {
            report.skipped.push(entry.path);
            continue;
        }
        let path = match StagePath::new(entry.path.as_str()) {
            Ok(path) => path,
            Err(e) => {
                warn!(path = %entry.path, error = %e, "skipping remote path");
                report.skipped.push(entry.path);
                continue;
            }
        };

        if staging.tracker().contains(&path) {
            report.kept.push(path);
            continue;
        }

        let local = FileReader::read(staging, &path).map_err(|source| PublishError::Read {
            path: path.clone(),
            source,
        })?;
        if local.is_some_and(|bytes| Oid::for_blob(&bytes) == entry.oid) {
            report.unchanged += 1;
            continue;
        }

        let bytes = deadline
            .run(Phase::Download, store.get_blob(&entry.oid))
            .await?;
        if Oid::for_blob(&bytes) != entry.oid {
            return Err(PublishError::Inconsistent(format!(
                "blob {} for '{}' does not match its content",
                entry.oid.short(7),
                path
            ))
            .into());
        }
        staging.write_clean(&path, &bytes)?;
        report.written.push(path);
    }

    debug!(
        written = report.written.len(),
        unchanged = report.unchanged,
        kept = report.kept.len(),
        skipped = report.skipped.len(),
        "pulled branch head"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::changeset::ChangeSet;
    use crate::store::mock::{FailOn, MockOperation, MockStore};
    use crate::store::StoreError;
    use tempfile::TempDir;

    fn main_branch() -> BranchName {
        BranchName::new("main").unwrap()
    }

    fn p(s: &str) -> StagePath {
        StagePath::new(s).unwrap()
    }

    mod health_check {
        use super::*;

        #[tokio::test]
        async fn reports_head() {
            let store = MockStore::new();
            let main = main_branch();
            let head = store.seed(&main, &[("a", b"1".as_slice())], "one");

            let report = check_health(&store, &main, &Deadline::none()).await.unwrap();
            assert_eq!(report.store, "mock");
            assert_eq!(report.head, Some(head));
        }

        #[tokio::test]
        async fn empty_repository_is_healthy() {
            let report = check_health(&MockStore::new(), &main_branch(), &Deadline::none())
                .await
                .unwrap();
            assert_eq!(report.head, None);
        }

        #[tokio::test]
        async fn auth_failure_is_unhealthy() {
            let store =
                MockStore::new().fail_on(FailOn::GetRef(StoreError::AuthFailed("bad".into())));
            let err = check_health(&store, &main_branch(), &Deadline::none())
                .await
                .unwrap_err();
            assert_eq!(err.phase(), Some(Phase::Resolve));
        }
    }

    mod history_walk {
        use super::*;

        #[tokio::test]
        async fn newest_first_and_limited() {
            let store = MockStore::new();
            let main = main_branch();
            let c1 = store.seed(&main, &[("a", b"1".as_slice())], "one");
            let c2 = store.seed(&main, &[("a", b"2".as_slice())], "two");
            let c3 = store.seed(&main, &[("a", b"3".as_slice())], "three");

            let all = history(&store, &main, 0, &Deadline::none()).await.unwrap();
            let commits: Vec<_> = all.iter().map(|e| e.commit.clone()).collect();
            assert_eq!(commits, vec![c3, c2.clone(), c1.clone()]);
            assert_eq!(all[1].message, "two");
            assert_eq!(all[1].parents, vec![c1]);
            assert!(all[2].parents.is_empty());

            let two = history(&store, &main, 2, &Deadline::none()).await.unwrap();
            assert_eq!(two.len(), 2);
            assert_eq!(two[1].commit, c2);
        }

        #[tokio::test]
        async fn missing_branch_has_no_history() {
            let entries = history(&MockStore::new(), &main_branch(), 10, &Deadline::none())
                .await
                .unwrap();
            assert!(entries.is_empty());
        }

        #[tokio::test]
        async fn unreadable_commit_fails_in_history_phase() {
            let store = MockStore::new();
            let main = main_branch();
            store.seed(&main, &[("a", b"1".as_slice())], "one");
            let store = store.fail_on(FailOn::GetCommit(StoreError::RateLimited));

            let err = history(&store, &main, 0, &Deadline::none())
                .await
                .unwrap_err();
            assert_eq!(err.phase(), Some(Phase::History));
        }
    }

    mod pull_head {
        use super::*;

        fn staging(dir: &TempDir) -> StagingArea {
            StagingArea::new(dir.path().join("public"), ChangeSet::new())
        }

        #[tokio::test]
        async fn writes_head_files_clean() {
            let dir = TempDir::new().unwrap();
            let staging = staging(&dir);
            let store = MockStore::new();
            let main = main_branch();
            let head = store.seed(
                &main,
                &[
                    ("index.html", b"<h1>hi</h1>".as_slice()),
                    ("img/logo.png", [0x89u8, 0x50, 0x00].as_slice()),
                ],
                "seed",
            );

            let report = pull(&store, &main, &staging, &Deadline::none())
                .await
                .unwrap();

            assert_eq!(report.head, Some(head));
            assert_eq!(report.written, vec![p("img/logo.png"), p("index.html")]);
            assert_eq!(staging.read(&p("img/logo.png")).unwrap(), vec![0x89, 0x50, 0x00]);
            assert!(staging.tracker().is_empty());
            assert_eq!(store.write_count(), 0);
        }

        #[tokio::test]
        async fn dirty_files_are_kept_and_matching_files_not_downloaded() {
            let dir = TempDir::new().unwrap();
            let staging = staging(&dir);
            let store = MockStore::new();
            let main = main_branch();
            store.seed(
                &main,
                &[
                    ("draft.md", b"remote".as_slice()),
                    ("same.txt", b"same".as_slice()),
                ],
                "seed",
            );
            staging.write(&p("draft.md"), b"local edit").unwrap();
            staging.write_clean(&p("same.txt"), b"same").unwrap();

            let report = pull(&store, &main, &staging, &Deadline::none())
                .await
                .unwrap();

            assert_eq!(report.kept, vec![p("draft.md")]);
            assert_eq!(report.unchanged, 1);
            assert!(report.written.is_empty());
            assert_eq!(staging.read(&p("draft.md")).unwrap(), b"local edit");
            assert!(!store
                .operations()
                .iter()
                .any(|op| matches!(op, MockOperation::GetBlob { .. })));
        }

        #[tokio::test]
        async fn empty_repository_pulls_nothing() {
            let dir = TempDir::new().unwrap();
            let report = pull(&MockStore::new(), &main_branch(), &staging(&dir), &Deadline::none())
                .await
                .unwrap();
            assert_eq!(report, PullReport::default());
        }

        #[tokio::test]
        async fn download_failure_is_tagged() {
            let dir = TempDir::new().unwrap();
            let staging = staging(&dir);
            let store = MockStore::new();
            let main = main_branch();
            store.seed(&main, &[("a.txt", b"a".as_slice())], "seed");
            let store = store.fail_on(FailOn::GetBlob(StoreError::NetworkError("reset".into())));

            let err = pull(&store, &main, &staging, &Deadline::none())
                .await
                .unwrap_err();
            match err {
                PullError::Remote(e) => assert_eq!(e.phase(), Some(Phase::Download)),
                other => panic!("unexpected error: {:?}", other),
            }
            assert!(staging.list(None, None).unwrap().is_empty());
        }
    }
}
