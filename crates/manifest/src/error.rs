//! Manifest Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A manifest error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for manifest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The manifest could not be opened, or it doesn't look like a manifest.
    /// Check the path (and that it's an unencrypted backup).
    #[display("unable to read manifest database")]
    Storage,
    #[display("manifest has no `{_0}` table")]
    MissingTable(#[error(not(source))] &'static str),
    #[display("manifest is missing required column: {_0}")]
    MissingColumn(#[error(not(source))] &'static str),
    /// Statement preparation or execution failed.
    #[display("catalog query failed")]
    Query,
    /// A required column holds something other than text.
    #[display("invalid catalog data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}
