//! engine::cycle
//!
//! The publish cycle: one batch of dirty files becomes one commit.
//!
//! # Sequence
//!
//! 1. Snapshot the change set. Empty => `NothingToPublish`, no store call.
//! 2. Read the staged bytes. All vanished => `NothingToPublish`, no store call.
//! 3. Resolve the branch head.
//! 4. Upload blobs and create one tree layered on the head's tree.
//! 5. Create the commit and move (or create) the branch.
//! 6. Append a commit log line. A failure here is only a warning.
//! 7. Clear the snapshot's paths from the change set.
//!
//! A genesis cycle that loses the race to create the branch goes back to
//! step 3 once and publishes on top of the winner. Every other failure ends
//! the cycle with the change set untouched.
//!
//! # Example
//!
//! ```
//! use stagepush::core::changeset::ChangeSet;
//! use stagepush::core::staging::StagingArea;
//! use stagepush::core::types::{BranchName, StagePath};
//! use stagepush::engine::{PublishCycle, PublishOutcome};
//! use stagepush::store::mock::MockStore;
//!
//! # tokio_test::block_on(async {
//! let dir = tempfile::tempdir().unwrap();
//! let tracker = ChangeSet::new();
//! let staging = StagingArea::new(dir.path().to_path_buf(), tracker.clone());
//! staging.write(&StagePath::new("a.txt").unwrap(), b"hello").unwrap();
//!
//! let store = MockStore::new();
//! let cycle = PublishCycle::new(&store, &staging, BranchName::new("main").unwrap());
//!
//! let outcome = cycle.run(&tracker, "init").await.unwrap();
//! assert!(matches!(outcome, PublishOutcome::Published(_)));
//! assert!(tracker.is_empty());
//! # });
//! ```

use std::time::Duration;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::deadline::Deadline;
use super::error::{Phase, PublishError};
use super::publish::publish;
use super::resolve::resolve_base;
use super::tree::{build_tree, read_staged, StagedFiles};
use crate::core::changeset::ChangeSet;
use crate::core::config::MissingFilePolicy;
use crate::core::ops::commit_log::{LogEntry, LogSink};
use crate::core::staging::FileReader;
use crate::core::types::{BranchName, Oid, StagePath};
use crate::store::{CreateCommitRequest, ObjectStore, Signature};

/// How many times a cycle may run the resolve-to-ref sequence.
const MAX_ATTEMPTS: u32 = 2;

/// A successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Identifier of this cycle in logs
    pub cycle_id: Uuid,
    pub commit: Oid,
    pub tree: Oid,
    /// `None` for a genesis commit
    pub parent: Option<Oid>,
    /// Paths included in the commit, sorted
    pub files: Vec<StagePath>,
    /// Dirty paths left out because their file vanished
    pub skipped: Vec<StagePath>,
    /// 1, or 2 after losing a genesis race
    pub attempts: u32,
    /// Set when the commit log line could not be written
    pub log_warning: Option<String>,
}

/// Result of a cycle that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published(PublishReport),
    /// Nothing was staged, or every staged file vanished.
    NothingToPublish { vanished: Vec<StagePath> },
}

/// What a cycle would publish right now, computed without the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishPreview {
    /// Dirty paths whose file exists
    pub files: Vec<StagePath>,
    /// Dirty paths whose file vanished
    pub missing: Vec<StagePath>,
}

impl PublishPreview {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A configured publish cycle.
///
/// The cycle holds no state between runs; run it once per batch.
pub struct PublishCycle<'a> {
    store: &'a dyn ObjectStore,
    reader: &'a dyn FileReader,
    log: Option<&'a dyn LogSink>,
    branch: BranchName,
    author: Option<Signature>,
    missing_files: MissingFilePolicy,
    timeout: Option<Duration>,
}

impl<'a> PublishCycle<'a> {
    pub fn new(store: &'a dyn ObjectStore, reader: &'a dyn FileReader, branch: BranchName) -> Self {
        Self {
            store,
            reader,
            log: None,
            branch,
            author: None,
            missing_files: MissingFilePolicy::default(),
            timeout: None,
        }
    }

    /// Record each published commit in `log`.
    pub fn with_log(mut self, log: &'a dyn LogSink) -> Self {
        self.log = Some(log);
        self
    }

    /// Author commits as `author` instead of the token owner.
    pub fn with_author(mut self, author: Option<Signature>) -> Self {
        self.author = author;
        self
    }

    pub fn with_missing_files(mut self, policy: MissingFilePolicy) -> Self {
        self.missing_files = policy;
        self
    }

    /// Bound the whole cycle, across all store calls.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    /// Publish the dirty paths of `tracker` as one commit.
    pub async fn run(
        &self,
        tracker: &ChangeSet,
        message: &str,
    ) -> Result<PublishOutcome, PublishError> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("publish", cycle = %cycle_id, branch = %self.branch);
        self.run_cycle(cycle_id, tracker, message)
            .instrument(span)
            .await
    }

    async fn run_cycle(
        &self,
        cycle_id: Uuid,
        tracker: &ChangeSet,
        message: &str,
    ) -> Result<PublishOutcome, PublishError> {
        let snapshot = tracker.snapshot();
        if snapshot.is_empty() {
            info!("nothing staged");
            return Ok(PublishOutcome::NothingToPublish {
                vanished: Vec::new(),
            });
        }

        let staged = read_staged(&snapshot, self.reader, self.missing_files)?;
        if staged.is_empty() {
            let vanished = staged.skipped;
            tracker.clear_only(&snapshot, &vanished);
            info!(vanished = vanished.len(), "every staged file vanished");
            return Ok(PublishOutcome::NothingToPublish { vanished });
        }

        let deadline = match self.timeout {
            Some(timeout) => Deadline::after(timeout),
            None => Deadline::none(),
        };

        let mut attempts = 0;
        let (commit, tree, parent) = loop {
            attempts += 1;
            match self.attempt(&staged, message, &deadline).await {
                Ok(published) => break published,
                Err(PublishError::Conflict {
                    phase: Phase::CreateRef,
                    message: reason,
                }) if attempts < MAX_ATTEMPTS => {
                    warn!(reason = %reason, "branch was created concurrently, publishing on top of it");
                }
                Err(e) => return Err(e),
            }
        };

        let files = staged.paths();
        let log_warning = self.record(LogEntry::new(message, files.clone(), Some(commit.clone())));

        let cleared = tracker.clear(&snapshot);
        info!(
            commit = %commit.short(7),
            files = files.len(),
            cleared,
            attempts,
            "published"
        );

        Ok(PublishOutcome::Published(PublishReport {
            cycle_id,
            commit,
            tree,
            parent,
            files,
            skipped: staged.skipped,
            attempts,
            log_warning,
        }))
    }

    /// Resolve, build and publish once. Returns (commit, tree, parent).
    async fn attempt(
        &self,
        staged: &StagedFiles,
        message: &str,
        deadline: &Deadline,
    ) -> Result<(Oid, Oid, Option<Oid>), PublishError> {
        let base = resolve_base(self.store, &self.branch, deadline).await?;

        let Some(built) = build_tree(self.store, base.tree(), staged, deadline).await? else {
            return Err(PublishError::Inconsistent(
                "no tree entries for a non-empty batch".to_string(),
            ));
        };

        let parent = base.parent().cloned();
        let request = CreateCommitRequest {
            message: message.to_string(),
            tree: built.tree.clone(),
            parents: parent.iter().cloned().collect(),
            author: self.author.clone(),
        };

        let commit = publish(self.store, &self.branch, request, deadline).await?;
        Ok((commit, built.tree, parent))
    }

    fn record(&self, entry: LogEntry) -> Option<String> {
        let log = self.log?;
        match log.append(&entry) {
            Ok(()) => {
                debug!("recorded commit log entry");
                None
            }
            Err(e) => {
                warn!(error = %e, "failed to record commit log entry");
                Some(e.to_string())
            }
        }
    }

    /// What [`run`](Self::run) would publish now. Makes no store call and
    /// leaves the change set untouched.
    pub fn preview(&self, tracker: &ChangeSet) -> Result<PublishPreview, PublishError> {
        preview(tracker, self.reader)
    }
}

/// Split the dirty paths of `tracker` into present and vanished files.
///
/// Needs no store, so it also serves status displays and dry runs.
pub fn preview(
    tracker: &ChangeSet,
    reader: &dyn FileReader,
) -> Result<PublishPreview, PublishError> {
    let mut preview = PublishPreview::default();
    for path in tracker.snapshot().paths() {
        let exists = reader
            .read(path)
            .map_err(|source| PublishError::Read {
                path: path.clone(),
                source,
            })?
            .is_some();
        if exists {
            preview.files.push(path.clone());
        } else {
            preview.missing.push(path.clone());
        }
    }
    Ok(preview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ops::commit_log::CommitLogError;
    use crate::core::staging::StagingArea;
    use crate::store::mock::{FailOn, MockStore};
    use crate::store::StoreError;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        tracker: ChangeSet,
        staging: StagingArea,
        store: MockStore,
        main: BranchName,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let tracker = ChangeSet::new();
        let staging = StagingArea::new(dir.path().join("public"), tracker.clone());
        Fixture {
            _dir: dir,
            tracker,
            staging,
            store: MockStore::new(),
            main: BranchName::new("main").unwrap(),
        }
    }

    fn p(s: &str) -> StagePath {
        StagePath::new(s).unwrap()
    }

    #[derive(Default)]
    struct MemoryLog {
        entries: Mutex<Vec<LogEntry>>,
        broken: bool,
    }

    impl LogSink for MemoryLog {
        fn append(&self, entry: &LogEntry) -> Result<(), CommitLogError> {
            if self.broken {
                return Err(CommitLogError::Io {
                    path: "commits.log".into(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.entries.lock().push(entry.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn records_log_entry() {
        let f = fixture();
        f.staging.write(&p("a.txt"), b"a").unwrap();
        let log = MemoryLog::default();

        let cycle = PublishCycle::new(&f.store, &f.staging, f.main.clone()).with_log(&log);
        let PublishOutcome::Published(report) = cycle.run(&f.tracker, "init").await.unwrap()
        else {
            panic!("expected a publish");
        };

        let entries = log.entries.lock();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "init");
        assert_eq!(entries[0].files, vec![p("a.txt")]);
        assert_eq!(entries[0].commit, Some(report.commit));
        assert!(report.log_warning.is_none());
    }

    #[tokio::test]
    async fn log_failure_is_only_a_warning() {
        let f = fixture();
        f.staging.write(&p("a.txt"), b"a").unwrap();
        let log = MemoryLog {
            broken: true,
            ..Default::default()
        };

        let cycle = PublishCycle::new(&f.store, &f.staging, f.main.clone()).with_log(&log);
        let PublishOutcome::Published(report) = cycle.run(&f.tracker, "init").await.unwrap()
        else {
            panic!("expected a publish");
        };

        assert!(report.log_warning.unwrap().contains("disk full"));
        assert!(f.tracker.is_empty());
        assert_eq!(f.store.head(&f.main), Some(report.commit));
    }

    #[tokio::test]
    async fn author_is_passed_to_commit() {
        let f = fixture();
        f.staging.write(&p("a.txt"), b"a").unwrap();
        let author = Signature {
            name: "Site Bot".to_string(),
            email: "bot@example.com".to_string(),
        };

        let cycle = PublishCycle::new(&f.store, &f.staging, f.main.clone())
            .with_author(Some(author));
        assert!(matches!(
            cycle.run(&f.tracker, "init").await.unwrap(),
            PublishOutcome::Published(_)
        ));
    }

    #[tokio::test]
    async fn vanished_paths_are_cleared_on_nothing_to_publish() {
        let f = fixture();
        f.tracker.mark_dirty(p("gone.txt"));

        let cycle = PublishCycle::new(&f.store, &f.staging, f.main.clone());
        let outcome = cycle.run(&f.tracker, "noop").await.unwrap();

        assert_eq!(
            outcome,
            PublishOutcome::NothingToPublish {
                vanished: vec![p("gone.txt")]
            }
        );
        assert!(f.tracker.is_empty());
        assert!(f.store.operations().is_empty());
    }

    #[tokio::test]
    async fn fail_policy_leaves_tracker_untouched() {
        let f = fixture();
        f.staging.write(&p("a.txt"), b"a").unwrap();
        f.tracker.mark_dirty(p("gone.txt"));

        let cycle = PublishCycle::new(&f.store, &f.staging, f.main.clone())
            .with_missing_files(MissingFilePolicy::Fail);
        let err = cycle.run(&f.tracker, "x").await.unwrap_err();

        assert!(matches!(err, PublishError::MissingFile { .. }));
        assert_eq!(f.tracker.len(), 2);
        assert!(f.store.operations().is_empty());
    }

    #[tokio::test]
    async fn second_create_ref_conflict_is_final() {
        let f = fixture();
        f.staging.write(&p("a.txt"), b"a").unwrap();
        let store = f
            .store
            .clone()
            .fail_on(FailOn::CreateRef(StoreError::AlreadyExists("exists".into())));

        let cycle = PublishCycle::new(&store, &f.staging, f.main.clone());
        let err = cycle.run(&f.tracker, "x").await.unwrap_err();

        assert!(matches!(
            err,
            PublishError::Conflict {
                phase: Phase::CreateRef,
                ..
            }
        ));
        assert_eq!(f.tracker.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_covers_the_whole_cycle() {
        let f = fixture();
        f.staging.write(&p("a.txt"), b"a").unwrap();
        f.staging.write(&p("b.txt"), b"b").unwrap();
        let store = f.store.clone().with_latency(Duration::from_millis(400));

        // Each call alone fits, but resolve + two blobs does not.
        let cycle = PublishCycle::new(&store, &f.staging, f.main.clone())
            .with_timeout(Duration::from_secs(1));
        let err = cycle.run(&f.tracker, "slow").await.unwrap_err();

        assert!(matches!(
            err,
            PublishError::Timeout {
                phase: Phase::CreateBlobs
            }
        ));
        assert_eq!(f.tracker.len(), 2);
    }

    #[test]
    fn preview_makes_no_store_call() {
        let f = fixture();
        f.staging.write(&p("a.txt"), b"a").unwrap();
        f.tracker.mark_dirty(p("gone.txt"));

        let cycle = PublishCycle::new(&f.store, &f.staging, f.main.clone());
        let preview = cycle.preview(&f.tracker).unwrap();

        assert_eq!(preview.files, vec![p("a.txt")]);
        assert_eq!(preview.missing, vec![p("gone.txt")]);
        assert!(f.store.operations().is_empty());
        assert_eq!(f.tracker.len(), 2);
    }
}
