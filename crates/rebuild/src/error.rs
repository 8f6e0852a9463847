//! Rebuild Error Types
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};

/// A rebuild error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for rebuild operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a rebuild failure.
///
/// Each variant identifies the subsystem that failed; the underlying error
/// is the child frame in the error tree.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading the manifest's catalog failed.
    #[display("unable to read the backup catalog")]
    Catalog,
    /// Checking the blob store, or writing into the target tree, failed.
    #[display("unable to copy file")]
    Storage,
    /// Post-processing could not inspect a copied file.
    #[display("unable to post-process file")]
    Conversion,
}
