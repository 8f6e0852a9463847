//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The configuration file or environment holds an invalid value.
    #[display("unable to load configuration")]
    Load,
    /// The backup directory could not be searched for manifests.
    #[display("unable to search for backups in {}", _0.display())]
    Discovery(#[error(not(source))] PathBuf),
    /// No backup was found; pass a manifest explicitly.
    #[display("no Manifest.db found in {}", _0.display())]
    NoManifest(#[error(not(source))] PathBuf),
    /// The platform has no user data directory to look for backups in.
    #[display("unable to determine the default backup directory")]
    NoBackupDir,
}
