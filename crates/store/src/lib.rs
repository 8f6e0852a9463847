//! Read-only access to a backup's content-addressed blob store.
//!
//! A device backup is a `Manifest.db` catalog plus a flat directory of blobs
//! named after each file's `fileID`. This crate maps IDs to blob locations
//! and answers "is it there?"; it never writes into the backup.

pub mod error;
mod path;
mod store;

pub use crate::path::{Rejection, validate as validate_path};
pub use crate::store::{BlobStore, resolve_blob_path};
