//! store::mock
//!
//! In-memory object store for deterministic testing.
//!
//! # Design
//!
//! Objects are content-addressed like a real git store: blob ids are git
//! blob SHA-1s, so ids computed locally with [`Oid::for_blob`] match. Trees
//! are kept flat (full path => entry) and hashed over a canonical listing,
//! which is deterministic but not byte-compatible with git tree objects.
//! Commit ids also fold in a sequence number so two otherwise identical
//! commits stay distinct.
//!
//! Refs behave as compare-and-set cells: `update_ref` fails with `Conflict`
//! unless the ref still points at `expected`, and `create_ref` fails with
//! `AlreadyExists` when the ref is present.
//!
//! Tests can inject failures ([`FailOn`]), add latency, inspect every call
//! ([`MockOperation`]), and arm a concurrent writer that advances the branch
//! right before the next ref write.
//!
//! # Example
//!
//! ```
//! use stagepush::core::types::BranchName;
//! use stagepush::store::mock::MockStore;
//! use stagepush::store::ObjectStore;
//!
//! # tokio_test::block_on(async {
//! let store = MockStore::new();
//! let main = BranchName::new("main").unwrap();
//! assert_eq!(store.get_ref(&main).await.unwrap(), None);
//!
//! let head = store.seed(&main, &[("b.txt", b"bee".as_slice())], "seed");
//! assert_eq!(store.get_ref(&main).await.unwrap(), Some(head));
//! # });
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{
    BlobContent, CommitInfo, CreateCommitRequest, CreateTreeRequest, FileMode, ObjectKind,
    ObjectStore, Signature, StoreError, TreeEntry, UpdateRefRequest,
};
use crate::core::types::{BranchName, Oid};

/// Flat tree: full path => (mode, blob id).
type FlatTree = BTreeMap<String, (FileMode, Oid)>;

/// Mock object store for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<MockStoreInner>>,
}

#[derive(Debug, Default)]
struct MockStoreInner {
    blobs: HashMap<Oid, Vec<u8>>,
    trees: HashMap<Oid, FlatTree>,
    commits: HashMap<Oid, CommitInfo>,
    refs: HashMap<BranchName, Oid>,
    commit_seq: u64,
    fail_on: Option<FailOn>,
    latency: Option<Duration>,
    pending_writer: Option<ConcurrentWriter>,
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    GetRef(StoreError),
    GetCommit(StoreError),
    GetTree(StoreError),
    GetBlob(StoreError),
    CreateBlob(StoreError),
    CreateTree(StoreError),
    CreateCommit(StoreError),
    UpdateRef(StoreError),
    CreateRef(StoreError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    GetRef {
        branch: String,
    },
    GetCommit {
        oid: Oid,
    },
    GetTree {
        oid: Oid,
    },
    GetBlob {
        oid: Oid,
    },
    CreateBlob {
        size: usize,
    },
    CreateTree {
        base_tree: Option<Oid>,
        paths: Vec<String>,
    },
    CreateCommit {
        parents: Vec<Oid>,
        message: String,
    },
    UpdateRef {
        branch: String,
        new: Oid,
        expected: Oid,
    },
    CreateRef {
        branch: String,
        oid: Oid,
    },
}

impl MockOperation {
    /// Whether this operation creates or moves anything on the store.
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            MockOperation::GetRef { .. }
                | MockOperation::GetCommit { .. }
                | MockOperation::GetTree { .. }
                | MockOperation::GetBlob { .. }
        )
    }
}

/// A commit another writer lands on the branch before our next ref write.
#[derive(Debug, Clone)]
struct ConcurrentWriter {
    branch: BranchName,
    files: Vec<(String, Vec<u8>)>,
    message: String,
}

impl MockStore {
    /// Create a new empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// # Example
    ///
    /// ```
    /// use stagepush::store::mock::{MockStore, FailOn};
    /// use stagepush::store::StoreError;
    ///
    /// let store = MockStore::new()
    ///     .fail_on(FailOn::CreateBlob(StoreError::RateLimited));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.inner.lock().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.inner.lock().fail_on = None;
    }

    /// Delay every operation by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.inner.lock().latency = Some(latency);
        self
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().operations.clone()
    }

    /// Number of recorded operations that create or move objects.
    pub fn write_count(&self) -> usize {
        self.inner
            .lock()
            .operations
            .iter()
            .filter(|op| op.is_write())
            .count()
    }

    /// Commit `files` on top of the current head of `branch` and move the
    /// branch there, without recording any operation.
    ///
    /// Returns the new commit id.
    pub fn seed(&self, branch: &BranchName, files: &[(&str, &[u8])], message: &str) -> Oid {
        let files: Vec<(String, Vec<u8>)> = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_vec()))
            .collect();
        let mut inner = self.inner.lock();
        inner.commit_files(branch, &files, message)
    }

    /// Arm a concurrent writer.
    ///
    /// Right before the next `update_ref` or `create_ref` call, another
    /// writer commits `files` on `branch` (creating it if needed). The armed
    /// writer fires once.
    pub fn race_next_ref_write(&self, branch: &BranchName, files: &[(&str, &[u8])], message: &str) {
        self.inner.lock().pending_writer = Some(ConcurrentWriter {
            branch: branch.clone(),
            files: files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_vec()))
                .collect(),
            message: message.to_string(),
        });
    }

    /// Current head of a branch.
    pub fn head(&self, branch: &BranchName) -> Option<Oid> {
        self.inner.lock().refs.get(branch).cloned()
    }

    /// A stored commit.
    pub fn commit(&self, oid: &Oid) -> Option<CommitInfo> {
        self.inner.lock().commits.get(oid).cloned()
    }

    /// Number of commits stored.
    pub fn commit_count(&self) -> usize {
        self.inner.lock().commits.len()
    }

    /// Full file content of a commit's tree, by path.
    pub fn files_at(&self, commit: &Oid) -> Option<BTreeMap<String, Vec<u8>>> {
        let inner = self.inner.lock();
        let info = inner.commits.get(commit)?;
        let tree = inner.trees.get(&info.tree)?;
        tree.iter()
            .map(|(path, (_, blob))| Some((path.clone(), inner.blobs.get(blob)?.clone())))
            .collect()
    }

    /// Record an operation, apply latency, and check the failure config.
    async fn begin(
        &self,
        op: MockOperation,
        check: impl Fn(&FailOn) -> Option<&StoreError>,
    ) -> Result<(), StoreError> {
        let latency = {
            let mut inner = self.inner.lock();
            inner.operations.push(op);
            inner.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let inner = self.inner.lock();
        match inner.fail_on.as_ref().and_then(check) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl MockStoreInner {
    fn put_tree(&mut self, tree: FlatTree) -> Oid {
        let mut listing = Vec::new();
        for (path, (mode, oid)) in &tree {
            listing.extend_from_slice(format!("{} {}\0{}\n", mode, path, oid).as_bytes());
        }
        let oid = Oid::hash_object("tree", &listing);
        self.trees.insert(oid.clone(), tree);
        oid
    }

    fn put_commit(
        &mut self,
        tree: Oid,
        parents: Vec<Oid>,
        message: String,
        author: Option<&Signature>,
    ) -> Oid {
        self.commit_seq += 1;
        let mut body = format!("tree {}\n", tree);
        for parent in &parents {
            body.push_str(&format!("parent {}\n", parent));
        }
        if let Some(author) = author {
            body.push_str(&format!("author {} <{}>\n", author.name, author.email));
        }
        body.push_str(&format!("seq {}\n\n{}", self.commit_seq, message));

        let oid = Oid::hash_object("commit", body.as_bytes());
        self.commits.insert(
            oid.clone(),
            CommitInfo {
                tree,
                parents,
                message,
            },
        );
        oid
    }

    fn commit_files(
        &mut self,
        branch: &BranchName,
        files: &[(String, Vec<u8>)],
        message: &str,
    ) -> Oid {
        let parent = self.refs.get(branch).cloned();
        let mut tree = parent
            .as_ref()
            .and_then(|p| self.commits.get(p))
            .and_then(|c| self.trees.get(&c.tree))
            .cloned()
            .unwrap_or_default();

        for (path, content) in files {
            let blob = Oid::for_blob(content);
            self.blobs.insert(blob.clone(), content.clone());
            tree.insert(path.clone(), (FileMode::Regular, blob));
        }

        let tree = self.put_tree(tree);
        let commit = self.put_commit(
            tree,
            parent.into_iter().collect(),
            message.to_string(),
            None,
        );
        self.refs.insert(branch.clone(), commit.clone());
        commit
    }

    fn fire_pending_writer(&mut self) {
        if let Some(writer) = self.pending_writer.take() {
            self.commit_files(&writer.branch, &writer.files, &writer.message);
        }
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_ref(&self, branch: &BranchName) -> Result<Option<Oid>, StoreError> {
        self.begin(
            MockOperation::GetRef {
                branch: branch.to_string(),
            },
            |f| match f {
                FailOn::GetRef(e) => Some(e),
                _ => None,
            },
        )
        .await?;

        Ok(self.inner.lock().refs.get(branch).cloned())
    }

    async fn get_commit(&self, oid: &Oid) -> Result<CommitInfo, StoreError> {
        self.begin(MockOperation::GetCommit { oid: oid.clone() }, |f| match f {
            FailOn::GetCommit(e) => Some(e),
            _ => None,
        })
        .await?;

        self.inner
            .lock()
            .commits
            .get(oid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("commit {}", oid)))
    }

    async fn get_tree(&self, oid: &Oid) -> Result<Vec<TreeEntry>, StoreError> {
        self.begin(MockOperation::GetTree { oid: oid.clone() }, |f| match f {
            FailOn::GetTree(e) => Some(e),
            _ => None,
        })
        .await?;

        let inner = self.inner.lock();
        let tree = inner
            .trees
            .get(oid)
            .ok_or_else(|| StoreError::NotFound(format!("tree {}", oid)))?;

        Ok(tree
            .iter()
            .map(|(path, (mode, blob))| TreeEntry {
                path: path.clone(),
                mode: *mode,
                kind: ObjectKind::Blob,
                oid: blob.clone(),
            })
            .collect())
    }

    async fn get_blob(&self, oid: &Oid) -> Result<Vec<u8>, StoreError> {
        self.begin(MockOperation::GetBlob { oid: oid.clone() }, |f| match f {
            FailOn::GetBlob(e) => Some(e),
            _ => None,
        })
        .await?;

        self.inner
            .lock()
            .blobs
            .get(oid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("blob {}", oid)))
    }

    async fn create_blob(&self, content: BlobContent) -> Result<Oid, StoreError> {
        self.begin(
            MockOperation::CreateBlob {
                size: content.bytes().len(),
            },
            |f| match f {
                FailOn::CreateBlob(e) => Some(e),
                _ => None,
            },
        )
        .await?;

        let oid = Oid::for_blob(content.bytes());
        self.inner
            .lock()
            .blobs
            .insert(oid.clone(), content.bytes().to_vec());
        Ok(oid)
    }

    async fn create_tree(&self, request: CreateTreeRequest) -> Result<Oid, StoreError> {
        self.begin(
            MockOperation::CreateTree {
                base_tree: request.base_tree.clone(),
                paths: request.entries.iter().map(|e| e.path.clone()).collect(),
            },
            |f| match f {
                FailOn::CreateTree(e) => Some(e),
                _ => None,
            },
        )
        .await?;

        let mut inner = self.inner.lock();
        let mut tree = match &request.base_tree {
            Some(base) => inner
                .trees
                .get(base)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(format!("base tree {}", base)))?,
            None => FlatTree::new(),
        };

        for entry in request.entries {
            if entry.kind != ObjectKind::Blob {
                return Err(StoreError::ApiError {
                    status: 422,
                    message: format!("mock store only accepts blob entries, got {}", entry.kind),
                });
            }
            if !inner.blobs.contains_key(&entry.oid) {
                return Err(StoreError::ApiError {
                    status: 422,
                    message: format!("blob {} does not exist", entry.oid),
                });
            }
            tree.insert(entry.path, (entry.mode, entry.oid));
        }

        Ok(inner.put_tree(tree))
    }

    async fn create_commit(&self, request: CreateCommitRequest) -> Result<Oid, StoreError> {
        self.begin(
            MockOperation::CreateCommit {
                parents: request.parents.clone(),
                message: request.message.clone(),
            },
            |f| match f {
                FailOn::CreateCommit(e) => Some(e),
                _ => None,
            },
        )
        .await?;

        let mut inner = self.inner.lock();
        if !inner.trees.contains_key(&request.tree) {
            return Err(StoreError::ApiError {
                status: 422,
                message: format!("tree {} does not exist", request.tree),
            });
        }
        if let Some(missing) = request
            .parents
            .iter()
            .find(|p| !inner.commits.contains_key(*p))
        {
            return Err(StoreError::ApiError {
                status: 422,
                message: format!("parent {} does not exist", missing),
            });
        }

        Ok(inner.put_commit(
            request.tree,
            request.parents,
            request.message,
            request.author.as_ref(),
        ))
    }

    async fn update_ref(
        &self,
        branch: &BranchName,
        request: UpdateRefRequest,
    ) -> Result<(), StoreError> {
        self.begin(
            MockOperation::UpdateRef {
                branch: branch.to_string(),
                new: request.new.clone(),
                expected: request.expected.clone(),
            },
            |f| match f {
                FailOn::UpdateRef(e) => Some(e),
                _ => None,
            },
        )
        .await?;

        let mut inner = self.inner.lock();
        inner.fire_pending_writer();

        if !inner.commits.contains_key(&request.new) {
            return Err(StoreError::ApiError {
                status: 422,
                message: format!("commit {} does not exist", request.new),
            });
        }

        match inner.refs.get(branch).cloned() {
            None => Err(StoreError::NotFound(format!("ref {}", branch.full_ref()))),
            Some(current) if current != request.expected => Err(StoreError::Conflict(format!(
                "{} is at {}, expected {}",
                branch,
                current.short(7),
                request.expected.short(7)
            ))),
            Some(_) => {
                inner.refs.insert(branch.clone(), request.new);
                Ok(())
            }
        }
    }

    async fn create_ref(&self, branch: &BranchName, oid: &Oid) -> Result<(), StoreError> {
        self.begin(
            MockOperation::CreateRef {
                branch: branch.to_string(),
                oid: oid.clone(),
            },
            |f| match f {
                FailOn::CreateRef(e) => Some(e),
                _ => None,
            },
        )
        .await?;

        let mut inner = self.inner.lock();
        inner.fire_pending_writer();

        if inner.refs.contains_key(branch) {
            return Err(StoreError::AlreadyExists(format!(
                "ref {} already exists",
                branch.full_ref()
            )));
        }
        if !inner.commits.contains_key(oid) {
            return Err(StoreError::ApiError {
                status: 422,
                message: format!("commit {} does not exist", oid),
            });
        }

        inner.refs.insert(branch.clone(), oid.clone());
        Ok(())
    }
}
