//! Read-only queries against a backup's `Manifest.db`.
//!
//! The manifest is a SQLite database whose `Files` table lists every
//! backed-up file: its `fileID` (the name of its blob in the store), the
//! `domain` it belongs to, and its `relativePath` inside that domain. This
//! crate never writes to the manifest.
//!
//! Queries are lazy [`Stream`](futures::Stream)s that hold a single cursor
//! while they're being consumed, see [`domains`] and [`files`].

mod db;
pub mod error;
#[cfg(any(test, feature = "fixture"))]
pub mod fixture;
mod hash;
mod models;
mod query;

pub use crate::db::Manifest;
pub use crate::hash::file_id;
pub use crate::models::{CatalogEntry, Columns, Value};
pub use crate::query::{Source, domains, files};
