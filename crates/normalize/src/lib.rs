//! Plain-text normalization of the file formats iOS apps like to store.
//!
//! - [`magic`] sniffs a file's type from its leading bytes,
//! - [`plist`] rewrites binary property lists as XML,
//! - [`dump`] writes a SQLite database out as SQL text.

pub mod dump;
pub mod error;
pub mod magic;
pub mod plist;

pub use crate::magic::{Classifier, FileMagic, MagicClassifier};
