//! store::traits
//!
//! Object store trait definition for the remote git data API.
//!
//! # Design
//!
//! The `ObjectStore` trait is async because every operation is network I/O.
//! It exposes the primitives needed to build a commit remotely (read a ref,
//! read a commit and its tree, create blobs, trees and commits, then move or
//! create the ref) plus `get_blob` for pulling published content back down.
//!
//! Object identity is content-addressed: creating the same blob twice yields
//! the same id, so repeating creation after a failed cycle is harmless.
//!
//! # Example
//!
//! ```ignore
//! use stagepush::store::{BlobContent, ObjectStore, StoreError};
//!
//! async fn upload(store: &dyn ObjectStore) -> Result<(), StoreError> {
//!     let blob = store.create_blob(BlobContent::new(b"hello".to_vec())).await?;
//!     println!("blob {}", blob);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use base64::Engine as _;
use thiserror::Error;

use crate::core::types::{BranchName, Oid, StagePath};

/// Errors from object store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Authentication is required but not available.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested object or ref was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A ref update was rejected because the ref moved.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A ref creation was rejected because the ref exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The store answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    /// Whether retrying the whole cycle later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::RateLimited | StoreError::NetworkError(_) => true,
            StoreError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Git file mode of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileMode {
    /// `100644`
    #[default]
    Regular,
    /// `100755`
    Executable,
    /// `120000`
    Symlink,
    /// `040000`
    Directory,
    /// `160000`
    Submodule,
}

impl FileMode {
    /// Octal mode string used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileMode::Regular => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Directory => "040000",
            FileMode::Submodule => "160000",
        }
    }

    /// Parse a wire mode string.
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "100644" => Some(FileMode::Regular),
            "100755" => Some(FileMode::Executable),
            "120000" => Some(FileMode::Symlink),
            "040000" | "40000" => Some(FileMode::Directory),
            "160000" => Some(FileMode::Submodule),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of object a tree entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "blob" => Some(ObjectKind::Blob),
            "tree" => Some(ObjectKind::Tree),
            "commit" => Some(ObjectKind::Commit),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a tree, addressed by its full path from the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Full slash-separated path from the tree root
    pub path: String,
    pub mode: FileMode,
    pub kind: ObjectKind,
    pub oid: Oid,
}

impl TreeEntry {
    /// A regular file entry pointing at a blob.
    pub fn file(path: &StagePath, oid: Oid) -> Self {
        Self {
            path: path.as_str().to_string(),
            mode: FileMode::Regular,
            kind: ObjectKind::Blob,
            oid,
        }
    }
}

/// How blob bytes are transported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Base64,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Base64 => "base64",
        }
    }
}

/// Content of a blob to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobContent {
    bytes: Vec<u8>,
}

impl BlobContent {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `Utf8` when the bytes are valid UTF-8, `Base64` otherwise.
    pub fn encoding(&self) -> Encoding {
        if std::str::from_utf8(&self.bytes).is_ok() {
            Encoding::Utf8
        } else {
            Encoding::Base64
        }
    }

    /// The payload encoded for the wire, with its encoding.
    pub fn encode(&self) -> (String, Encoding) {
        match std::str::from_utf8(&self.bytes) {
            Ok(text) => (text.to_string(), Encoding::Utf8),
            Err(_) => (
                base64::engine::general_purpose::STANDARD.encode(&self.bytes),
                Encoding::Base64,
            ),
        }
    }
}

/// Decode blob content as the store returned it.
///
/// Base64 payloads may be wrapped across lines; whitespace is ignored.
pub fn decode_blob(content: &str, encoding: &str) -> Result<Vec<u8>, StoreError> {
    match encoding {
        "base64" => {
            let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map_err(|e| StoreError::InvalidResponse(format!("bad base64 blob: {}", e)))
        }
        "utf-8" | "utf8" => Ok(content.as_bytes().to_vec()),
        other => Err(StoreError::InvalidResponse(format!(
            "unknown blob encoding '{}'",
            other
        ))),
    }
}

/// Commit author or committer identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

/// Commit information returned from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub tree: Oid,
    pub parents: Vec<Oid>,
    pub message: String,
}

/// Request to create a tree.
#[derive(Debug, Clone)]
pub struct CreateTreeRequest {
    /// Existing tree to layer the entries on; `None` creates a root tree
    pub base_tree: Option<Oid>,
    pub entries: Vec<TreeEntry>,
}

/// Request to create a commit.
#[derive(Debug, Clone)]
pub struct CreateCommitRequest {
    pub message: String,
    pub tree: Oid,
    /// Empty for a genesis commit
    pub parents: Vec<Oid>,
    /// `None` lets the store attribute the commit to the token owner
    pub author: Option<Signature>,
}

/// Request to move an existing ref.
#[derive(Debug, Clone)]
pub struct UpdateRefRequest {
    /// Commit the ref should point at afterwards
    pub new: Oid,
    /// Commit the caller believes the ref currently points at
    pub expected: Oid,
}

/// The object store trait for the remote git data API.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, StoreError>`. Callers should handle:
/// - `AuthRequired` / `AuthFailed`: Check the configured token
/// - `Conflict`: The ref moved; restart from resolution
/// - `AlreadyExists`: Another writer created the ref first
/// - `RateLimited` / `NetworkError` / 5xx: Retry the whole cycle later
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get the store name (e.g., "github", "mock").
    fn name(&self) -> &'static str;

    /// Read the commit a branch points at.
    ///
    /// Returns `None` when the branch does not exist, including when the
    /// repository has no refs at all.
    async fn get_ref(&self, branch: &BranchName) -> Result<Option<Oid>, StoreError>;

    /// Read a commit.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the commit does not exist
    async fn get_commit(&self, oid: &Oid) -> Result<CommitInfo, StoreError>;

    /// List every entry of a tree, recursively, as full paths.
    async fn get_tree(&self, oid: &Oid) -> Result<Vec<TreeEntry>, StoreError>;

    /// Read the raw bytes of a blob.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the blob does not exist
    async fn get_blob(&self, oid: &Oid) -> Result<Vec<u8>, StoreError>;

    /// Store a blob and return its id.
    async fn create_blob(&self, content: BlobContent) -> Result<Oid, StoreError>;

    /// Create a tree from entries, optionally layered on a base tree.
    ///
    /// With a base tree the result is the union: entries replace base
    /// entries at the same path, every other base entry is kept.
    async fn create_tree(&self, request: CreateTreeRequest) -> Result<Oid, StoreError>;

    /// Create a commit object. Does not move any ref.
    async fn create_commit(&self, request: CreateCommitRequest) -> Result<Oid, StoreError>;

    /// Move an existing branch to a new commit.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the branch no longer points at `expected`
    /// - `NotFound` if the branch does not exist
    async fn update_ref(
        &self,
        branch: &BranchName,
        request: UpdateRefRequest,
    ) -> Result<(), StoreError>;

    /// Create a branch pointing at a commit.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the branch exists
    async fn create_ref(&self, branch: &BranchName, oid: &Oid) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_mode_roundtrip() {
        for mode in [
            FileMode::Regular,
            FileMode::Executable,
            FileMode::Symlink,
            FileMode::Directory,
            FileMode::Submodule,
        ] {
            assert_eq!(FileMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(FileMode::parse("40000"), Some(FileMode::Directory));
        assert_eq!(FileMode::parse("777"), None);
    }

    #[test]
    fn object_kind_display() {
        assert_eq!(format!("{}", ObjectKind::Blob), "blob");
        assert_eq!(ObjectKind::parse("tree"), Some(ObjectKind::Tree));
        assert_eq!(ObjectKind::parse("tag"), None);
    }

    mod blob_content {
        use super::*;

        #[test]
        fn text_is_sent_as_utf8() {
            let blob = BlobContent::new("héllo".as_bytes().to_vec());
            assert_eq!(blob.encoding(), Encoding::Utf8);
            assert_eq!(blob.encode(), ("héllo".to_string(), Encoding::Utf8));
        }

        #[test]
        fn binary_is_sent_as_base64() {
            let blob = BlobContent::new(vec![0xff, 0x00, 0xfe]);
            assert_eq!(blob.encoding(), Encoding::Base64);
            assert_eq!(blob.encode(), ("/wD+".to_string(), Encoding::Base64));
        }

        #[test]
        fn empty_is_utf8() {
            assert_eq!(BlobContent::new(Vec::new()).encoding(), Encoding::Utf8);
        }
    }

    mod decode_blob {
        use super::*;

        #[test]
        fn wrapped_base64_is_joined() {
            assert_eq!(decode_blob("aGVs\nbG8=\n", "base64").unwrap(), b"hello");
        }

        #[test]
        fn utf8_is_taken_verbatim() {
            assert_eq!(decode_blob("héllo", "utf-8").unwrap(), "héllo".as_bytes());
        }

        #[test]
        fn unknown_encoding_is_invalid() {
            assert!(matches!(
                decode_blob("x", "rot13"),
                Err(StoreError::InvalidResponse(_))
            ));
            assert!(matches!(
                decode_blob("!!!", "base64"),
                Err(StoreError::InvalidResponse(_))
            ));
        }
    }

    #[test]
    fn transient_classification() {
        assert!(StoreError::RateLimited.is_transient());
        assert!(StoreError::NetworkError("reset".into()).is_transient());
        assert!(StoreError::ApiError {
            status: 502,
            message: "bad gateway".into()
        }
        .is_transient());
        assert!(!StoreError::ApiError {
            status: 400,
            message: "bad".into()
        }
        .is_transient());
        assert!(!StoreError::Conflict("moved".into()).is_transient());
        assert!(!StoreError::AuthFailed("expired".into()).is_transient());
    }

    #[test]
    fn store_error_display() {
        assert_eq!(
            format!("{}", StoreError::AuthRequired),
            "authentication required"
        );
        assert_eq!(
            format!("{}", StoreError::Conflict("not a fast forward".into())),
            "conflict: not a fast forward"
        );
        assert_eq!(
            format!(
                "{}",
                StoreError::ApiError {
                    status: 422,
                    message: "Validation failed".into()
                }
            ),
            "API error: 422 - Validation failed"
        );
    }
}
