//! The rebuilt tree: `<target>/<domain>/<relative path>`.

use exn::ResultExt;
use std::fs::FileTimes;
use std::path::{Path, PathBuf};
use tokio::fs;
use unsync_store::error::{ErrorKind as StoreErrorKind, Result as StoreResult};
use unsync_store::validate_path;

use crate::error::{ErrorKind, Result};

/// Where an entry ends up inside `root`.
///
/// The domain and the relative path are validated separately, so neither can
/// climb out of its parent: a relative path never leaves its domain's
/// directory, and a domain never leaves `root`. A relative path that
/// normalizes to nothing (the domain directory itself) is rejected as well.
pub fn destination(root: &Path, domain: &str, relative_path: &str) -> StoreResult<PathBuf> {
    let domain = validate_path(domain)?;
    let relative_path = validate_path(relative_path)?;
    Ok(root.join(domain).join(relative_path))
}

/// Copy `source` over `destination`, creating any missing parent directories.
///
/// Content and permissions are copied, then access and modification times,
/// so that rebuilding twice gives an identical tree.
pub(crate) async fn copy(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreErrorKind::from_io(e, parent))
            .or_raise(|| ErrorKind::Storage)?;
    }
    fs::copy(source, destination)
        .await
        .map_err(|e| StoreErrorKind::from_io(e, destination))
        .or_raise(|| ErrorKind::Storage)?;
    copy_times(source, destination)
        .await
        .map_err(|e| StoreErrorKind::from_io(e, destination))
        .or_raise(|| ErrorKind::Storage)
}

async fn copy_times(source: &Path, destination: &Path) -> std::io::Result<()> {
    let metadata = fs::metadata(source).await?;
    let times = FileTimes::new().set_accessed(metadata.accessed()?).set_modified(metadata.modified()?);
    // Setting times on an open handle only needs ownership, not write
    // access, so read-only copies work too.
    let file = fs::File::open(destination).await?.into_std().await;
    file.set_times(times)
}
