//! Rebuild a device backup's original directory tree.
//!
//! Every entry of the manifest's catalog is copied from the blob store to
//! `<target>/<domain>/<relative path>`. Optionally, copied files are
//! normalized into something diffable (see [`postprocess()`]).

pub mod error;
mod postprocess;
mod rebuild;
mod target;

pub use crate::postprocess::{Conversion, postprocess};
pub use crate::rebuild::{Action, Context, RebuildEvent, Summary, rebuild, rebuild_all, rebuild_file};
pub use crate::target::destination;
