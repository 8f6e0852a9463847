//! Sharded blob directory that sits next to `Manifest.db`.
//!
//! Every backed-up file is stored under its `fileID`, sharded into
//! directories named after the first two hex characters of that ID:
//!
//! ```text
//! <backup>/Manifest.db
//! <backup>/ab/ab1234...
//! <backup>/ff/ff0042...
//! ```

use crate::error::{ErrorKind, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Read-only view of a backup's content-addressed blob directory.
///
/// Paths are computed without touching the filesystem; only
/// [`exists`](Self::exists) and [`open`](Self::open) perform I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobStore {
    root: PathBuf,
}
impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The blob store for a manifest is the directory containing it.
    ///
    /// A bare file name (no parent component) means the current directory.
    pub fn for_manifest(manifest: impl AsRef<Path>) -> Self {
        let root = match manifest.as_ref().parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the blob for `file_id`: `<root>/<file_id[0..2]>/<file_id>`.
    ///
    /// Pure string manipulation, the result does not depend on filesystem
    /// state. `file_id` is expected to be at least two characters long (it's
    /// a SHA-1 hex digest in every real manifest); shorter IDs are not
    /// validated and resolve to `<root>/<file_id>/<file_id>`.
    pub fn resolve(&self, file_id: &str) -> PathBuf {
        let shard = file_id.get(..2).unwrap_or(file_id);
        self.root.join(shard).join(file_id)
    }

    /// Check whether the blob for `file_id` is present.
    ///
    /// Backups are routinely partial, so `Ok(false)` is an ordinary answer.
    /// Only unexpected failures (permissions on the shard directory, etc.)
    /// are errors.
    pub async fn exists(&self, file_id: &str) -> Result<bool> {
        let path = self.resolve(file_id);
        fs::try_exists(&path).await.map_err(|e| ErrorKind::from_io(e, &path).into())
    }

    /// Open the blob for `file_id` for reading.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the blob is
    /// missing from the store.
    pub async fn open(&self, file_id: &str) -> Result<fs::File> {
        let path = self.resolve(file_id);
        fs::File::open(&path).await.map_err(|e| ErrorKind::from_io(e, &path).into())
    }
}

/// Free-function form of [`BlobStore::resolve`] for one-off lookups.
pub fn resolve_blob_path(manifest: impl AsRef<Path>, file_id: &str) -> PathBuf {
    BlobStore::for_manifest(manifest).resolve(file_id)
}
