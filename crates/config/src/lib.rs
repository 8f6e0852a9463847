//! Configuration for unsync.
//!
//! Values are merged from (lowest precedence first) built-in defaults, a
//! TOML file and `UNSYNC_`-prefixed environment variables. Command-line
//! flags are applied on top by the binary.
//!
//! ```toml
//! # ~/.config/unsync/config.toml
//! backup_dir = "/Volumes/External/MobileSync/Backup"
//! output = "/Users/me/Restored"
//! postprocess = true
//! log = "info,unsync_rebuild=debug"
//! ```

mod discover;
pub mod error;

use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result};
pub use crate::discover::{MANIFEST_FILE, backup_dir, latest_manifest, manifests};

pub const ENV_PREFIX: &str = "UNSYNC_";
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where to look for backups instead of the platform default.
    pub backup_dir: Option<PathBuf>,
    /// Manifest to use instead of the most recent backup's.
    pub manifest: Option<PathBuf>,
    /// Root directory of rebuilt trees.
    pub output: PathBuf,
    /// Normalize plists and SQLite databases after copying.
    pub postprocess: bool,
    /// `tracing` filter directives used as the base log level.
    pub log: Option<String>,
}
impl Default for Config {
    fn default() -> Self {
        Self { backup_dir: None, manifest: None, output: PathBuf::from("."), postprocess: false, log: None }
    }
}

impl Config {
    /// Load configuration from `file`, or from the per-user config file when
    /// `file` is `None` (it's fine for that one not to exist).
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = file.map(Path::to_path_buf).or_else(Self::default_file);
        Self::figment(file.as_deref()).extract().or_raise(|| ErrorKind::Load)
    }

    /// The layered providers behind [`load`](Self::load).
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "Loading configuration file");
            figment = figment.merge(Toml::file_exact(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// `<config dir>/unsync/config.toml`, if it exists.
    pub fn default_file() -> Option<PathBuf> {
        let dirs = ProjectDirs::from("", "", "unsync")?;
        Some(dirs.config_dir().join(CONFIG_FILE)).filter(|path| path.is_file())
    }

    /// The configured backup directory, else the platform default.
    pub fn backup_dir(&self) -> Result<PathBuf> {
        self.backup_dir.clone().or_else(backup_dir).ok_or_raise(|| ErrorKind::NoBackupDir)
    }

    /// The configured manifest, else the most recent one in
    /// [`backup_dir`](Self::backup_dir).
    pub fn manifest(&self) -> Result<PathBuf> {
        match &self.manifest {
            Some(manifest) => Ok(manifest.clone()),
            None => latest_manifest(&self.backup_dir()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config: Config = Config::figment(None).extract()?;
            assert_eq!(config, Config::default());
            assert_eq!(config.output, PathBuf::from("."));
            assert!(!config.postprocess);
            Ok(())
        });
    }

    #[test]
    fn test_file_then_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "unsync.toml",
                r#"
                    output = "/restored"
                    postprocess = true
                    log = "debug"
                "#,
            )?;
            jail.set_env("UNSYNC_OUTPUT", "/elsewhere");
            let config = Config::load(Some(Path::new("unsync.toml"))).unwrap();
            assert_eq!(config.output, PathBuf::from("/elsewhere"));
            assert!(config.postprocess);
            assert_eq!(config.log.as_deref(), Some("debug"));
            assert_eq!(config.manifest, None);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_must_exist() {
        Jail::expect_with(|_jail| {
            let err = Config::load(Some(Path::new("missing.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_value() {
        Jail::expect_with(|jail| {
            jail.set_env("UNSYNC_POSTPROCESS", "[1, 2]");
            let err = Config::figment(None).extract::<Config>().unwrap_err();
            assert_eq!(err.path, ["postprocess"]);
            Ok(())
        });
    }

    #[test]
    fn test_manifest_discovery() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backup = temp_dir.path().join("device");
        std::fs::create_dir_all(&backup).unwrap();
        std::fs::write(backup.join(MANIFEST_FILE), b"").unwrap();

        let config = Config { backup_dir: Some(temp_dir.path().to_path_buf()), ..Config::default() };
        assert_eq!(config.manifest().unwrap(), backup.join(MANIFEST_FILE));

        let explicit = Config { manifest: Some(PathBuf::from("/some/Manifest.db")), ..config.clone() };
        assert_eq!(explicit.manifest().unwrap(), PathBuf::from("/some/Manifest.db"));

        let empty = Config { backup_dir: Some(temp_dir.path().join("nothing")), ..config };
        assert!(matches!(&*empty.manifest().unwrap_err(), ErrorKind::NoManifest(_)));
    }
}
