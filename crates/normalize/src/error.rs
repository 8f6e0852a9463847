//! Normalizer Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A normalizer error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for normalizer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The file's type could not be determined (usually it couldn't be read).
    #[display("unable to classify file: {}", _0.display())]
    Classification(#[error(not(source))] PathBuf),
    /// Not a property list, or one that can't be represented as XML.
    #[display("invalid property list: {}", _0.display())]
    InvalidPlist(#[error(not(source))] PathBuf),
    /// Not a SQLite database, or one SQLite refuses to read.
    #[display("unable to read database: {}", _0.display())]
    Database(#[error(not(source))] PathBuf),
    /// Output file could not be written.
    #[display("unable to write: {}", _0.display())]
    Write(#[error(not(source))] PathBuf),
    /// The output file appeared while it was being written.
    #[display("file already exists: {}", _0.display())]
    AlreadyExists(#[error(not(source))] PathBuf),
}
