//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

use crate::path::Rejection;

/// A blob store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for blob store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Blob (or file) does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied by the filesystem
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Path contains invalid characters or escapes its root
    #[display("invalid path {}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: Rejection },
}

impl ErrorKind {
    /// Attach the offending path to the two I/O failures a user can actually
    /// fix (missing file, permissions); everything else stays a plain I/O
    /// error.
    pub fn from_io(err: IoError, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_keeps_path() {
        let path = Path::new("ab/ab12");
        let err = IoError::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(ErrorKind::from_io(err, path), ErrorKind::NotFound(p) if p == path));
        let err = IoError::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(ErrorKind::from_io(err, path), ErrorKind::PermissionDenied(_)));
        let err = IoError::other("disk on fire");
        assert!(matches!(ErrorKind::from_io(err, path), ErrorKind::Io(_)));
    }
}
