//! Path validation for catalog-supplied paths.
//!
//! Domains and relative paths come straight out of the manifest database and
//! end up joined onto a directory we write into. This module makes sure they
//! can't climb out of that directory.

use derive_more::Display;
use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Why a catalog path was refused.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[display("nothing left after normalizing")]
    Empty,
    #[display("contains a NUL byte")]
    Nul,
    #[display("has a drive or UNC prefix")]
    Prefix,
    #[display("climbs above its root")]
    Escapes,
}

/// Normalize a path read from the catalog so it can be joined onto a
/// directory without leaving it.
///
/// Leading slashes, empty segments and `.` are dropped, and `..` is resolved
/// lexically. `Path::join` would otherwise let an absolute path replace the
/// root entirely. NUL bytes pass through `Path::components()` on Unix but
/// truncate paths in syscalls, so they are refused.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use unsync_store::validate_path;
/// assert!(validate_path("Library/Preferences/com.app.plist").is_ok());
/// assert!(validate_path("Documents/../notes.txt").is_ok());
/// assert!(validate_path("../../etc/passwd").is_err());
/// assert!(validate_path("").is_err());
/// assert_eq!(
///     validate_path("/Documents//./notes.txt/").unwrap(),
///     Path::new("Documents/notes.txt")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let reject = |reason| ErrorKind::InvalidPath { path: path.to_path_buf(), reason };
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) => exn::bail!(reject(Rejection::Prefix)),
            Component::RootDir | Component::CurDir => {},
            Component::ParentDir => {
                if !normalized.pop() {
                    exn::bail!(reject(Rejection::Escapes));
                }
            },
            Component::Normal(name) if name.as_encoded_bytes().contains(&0) => exn::bail!(reject(Rejection::Nul)),
            Component::Normal(name) => normalized.push(name),
        }
    }
    if normalized.as_os_str().is_empty() {
        exn::bail!(reject(Rejection::Empty));
    }
    Ok(normalized)
}
