//! core::staging
//!
//! The local staging area: a directory of files awaiting publication.
//!
//! # Design
//!
//! Every mutation of the staging area (write or delete) marks the path dirty
//! on the [`ChangeSet`] it was created with. Reads never mark, and neither
//! does [`StagingArea::write_clean`], which stores content already on the
//! remote branch.
//!
//! The publish engine only needs to read staged bytes, so it depends on the
//! narrow [`FileReader`] trait rather than on [`StagingArea`] itself.
//!
//! # Example
//!
//! ```
//! use stagepush::core::changeset::ChangeSet;
//! use stagepush::core::staging::StagingArea;
//! use stagepush::core::types::StagePath;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let tracker = ChangeSet::new();
//! let staging = StagingArea::new(dir.path().join("public"), tracker.clone());
//!
//! let path = StagePath::new("index.html").unwrap();
//! staging.write(&path, b"<h1>hi</h1>").unwrap();
//!
//! assert_eq!(staging.read(&path).unwrap(), b"<h1>hi</h1>");
//! assert!(tracker.contains(&path));
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::core::changeset::ChangeSet;
use crate::core::types::{StagePath, TypeError};

/// Reads staged file content for the publish engine.
///
/// Implementations must be binary safe. A file that does not exist is
/// `Ok(None)`, not an error.
pub trait FileReader: Send + Sync {
    /// Read the current bytes of a staged file.
    fn read(&self, path: &StagePath) -> io::Result<Option<Vec<u8>>>;
}

/// Errors from staging area operations.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error(transparent)]
    InvalidPath(#[from] TypeError),

    #[error("file not found: {0}")]
    NotFound(StagePath),

    #[error("staging i/o error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StagingError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A staging directory bound to a change set tracker.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
    tracker: ChangeSet,
}

impl StagingArea {
    /// Create a staging area rooted at `root`.
    ///
    /// The directory does not need to exist yet; it is created on first write.
    pub fn new(root: PathBuf, tracker: ChangeSet) -> Self {
        Self { root, tracker }
    }

    /// The staging root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The tracker that records mutations.
    pub fn tracker(&self) -> &ChangeSet {
        &self.tracker
    }

    /// Absolute location of a staged path.
    pub fn resolve(&self, path: &StagePath) -> PathBuf {
        path.as_str()
            .split('/')
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }

    /// Write a file and mark it dirty.
    pub fn write(&self, path: &StagePath, content: &[u8]) -> Result<(), StagingError> {
        self.write_clean(path, content)?;
        self.tracker.mark_dirty(path.clone());
        Ok(())
    }

    /// Write a file without marking it dirty.
    ///
    /// For content that already matches the remote branch, such as files
    /// pulled from its head.
    pub fn write_clean(&self, path: &StagePath, content: &[u8]) -> Result<(), StagingError> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| StagingError::io(parent, e))?;
        }
        fs::write(&target, content).map_err(|e| StagingError::io(&target, e))
    }

    /// Read a staged file.
    pub fn read(&self, path: &StagePath) -> Result<Vec<u8>, StagingError> {
        FileReader::read(self, path)
            .map_err(|e| StagingError::io(&self.resolve(path), e))?
            .ok_or_else(|| StagingError::NotFound(path.clone()))
    }

    /// Delete a staged file and mark it dirty.
    pub fn delete(&self, path: &StagePath) -> Result<(), StagingError> {
        let target = self.resolve(path);
        if !target.is_file() {
            return Err(StagingError::NotFound(path.clone()));
        }
        fs::remove_file(&target).map_err(|e| StagingError::io(&target, e))?;
        self.tracker.mark_dirty(path.clone());
        Ok(())
    }

    /// List staged files, sorted.
    ///
    /// `dir` restricts the walk to a subdirectory; `suffix` keeps only paths
    /// ending with it. Symlinks are not followed. Entries whose names are not
    /// valid UTF-8 are skipped.
    pub fn list(
        &self,
        dir: Option<&StagePath>,
        suffix: Option<&str>,
    ) -> Result<Vec<StagePath>, StagingError> {
        let start = match dir {
            Some(d) => self.resolve(d),
            None => self.root.clone(),
        };
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(&start).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| start.clone());
                StagingError::Io {
                    path,
                    source: io::Error::from(e),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let Some(rel) = slash_path(rel) else {
                continue;
            };
            if let Ok(path) = StagePath::new(rel) {
                found.push(path);
            }
        }

        if let Some(suffix) = suffix {
            found.retain(|p| p.as_str().ends_with(suffix));
        }
        found.sort();
        Ok(found)
    }
}

/// Join the components of a relative path with `/`, or `None` if any
/// component is not valid UTF-8.
fn slash_path(rel: &Path) -> Option<String> {
    let parts = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

impl FileReader for StagingArea {
    fn read(&self, path: &StagePath) -> io::Result<Option<Vec<u8>>> {
        let target = self.resolve(path);
        if target.is_dir() {
            return Ok(None);
        }
        match fs::read(&target) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
