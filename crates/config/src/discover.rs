//! Finding backups on the local machine.
//!
//! iTunes and Finder keep every device backup in its own directory under
//! `MobileSync/Backup`, each with a `Manifest.db` at its root.

use directories::BaseDirs;
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{ErrorKind, Result};

pub const MANIFEST_FILE: &str = "Manifest.db";

/// The platform's default backup directory, if the platform has one.
///
/// `~/Library/Application Support/MobileSync/Backup` on macOS,
/// `%APPDATA%\Apple Computer\MobileSync\Backup` on Windows.
pub fn backup_dir() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    let data_dir = base.data_dir();
    #[cfg(windows)]
    let data_dir = data_dir.join("Apple Computer");
    Some(data_dir.join("MobileSync").join("Backup"))
}

/// Every `<dir>/*/Manifest.db`, sorted by path.
///
/// A missing `dir` simply has no backups in it.
pub fn manifests(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "Backup directory does not exist");
            return Ok(Vec::new());
        },
        Err(e) => return Err(e).or_raise(|| ErrorKind::Discovery(dir.to_path_buf())),
    };
    let mut found = Vec::new();
    for entry in entries {
        let manifest = entry.or_raise(|| ErrorKind::Discovery(dir.to_path_buf()))?.path().join(MANIFEST_FILE);
        if manifest.is_file() {
            found.push(manifest);
        }
    }
    found.sort();
    Ok(found)
}

/// The most recently modified manifest in `dir`.
pub fn latest_manifest(dir: &Path) -> Result<PathBuf> {
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for manifest in manifests(dir)? {
        let modified = manifest
            .metadata()
            .and_then(|m| m.modified())
            .or_raise(|| ErrorKind::Discovery(dir.to_path_buf()))?;
        if latest.as_ref().is_none_or(|(newest, _)| modified > *newest) {
            latest = Some((modified, manifest));
        }
    }
    let (_, manifest) = latest.ok_or_raise(|| ErrorKind::NoManifest(dir.to_path_buf()))?;
    tracing::debug!(manifest = %manifest.display(), "Found latest manifest");
    Ok(manifest)
}
