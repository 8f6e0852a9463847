//! Post-processing of copied files.
//!
//! Two rules, evaluated independently of each other:
//! 1. binary property lists are rewritten in place as XML,
//! 2. SQLite databases get a `<name>.sql` text dump next to them, unless
//!    one is already there.

use exn::ResultExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use unsync_normalize::error::Error as NormalizeError;
use unsync_normalize::{Classifier, FileMagic, dump, plist};
use unsync_store::error::ErrorKind as StoreErrorKind;

use crate::error::{ErrorKind, Result};

/// The outcome of one post-processing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// A binary property list was rewritten in place as XML.
    Plist(PathBuf),
    /// A SQLite database was dumped to this `.sql` file.
    SqlDump(PathBuf),
    /// A SQLite database already had this `.sql` dump; left untouched.
    SqlDumpExists(PathBuf),
    /// A normalizer failed on this file. The copied file is kept as is.
    Failed(PathBuf),
}

/// Run every rule that applies to the file at `path`.
///
/// Classification never fails (see [`Classifier::classify`]) and neither
/// does a normalizer: its failure is logged and reported as
/// [`Conversion::Failed`]. The only error is being unable to check for an
/// existing `.sql` dump.
pub async fn postprocess(path: &Path, classifier: &dyn Classifier) -> Result<Vec<Conversion>> {
    let magic = classifier.classify(path).await;
    tracing::debug!(path = %path.display(), mime_type = magic.mime_type, name = magic.name, "Classified file");
    let mut conversions = Vec::new();

    if magic.name == FileMagic::BINARY_PLIST.name {
        tracing::info!(path = %path.display(), "Converting binary plist to XML");
        conversions.push(match plist::convert(path, None) {
            Ok(()) => Conversion::Plist(path.to_path_buf()),
            Err(e) => failed(path, e),
        });
    }

    if magic.mime_type == FileMagic::SQLITE.mime_type {
        let sql = sql_path(path);
        let exists = fs::try_exists(&sql)
            .await
            .map_err(|e| StoreErrorKind::from_io(e, &sql))
            .or_raise(|| ErrorKind::Conversion)?;
        if exists {
            tracing::debug!(path = %sql.display(), "SQL dump already exists");
            conversions.push(Conversion::SqlDumpExists(sql));
        } else {
            tracing::info!(path = %path.display(), "Dumping SQLite database");
            conversions.push(match dump::dump_to_file(path, &sql).await {
                Ok(()) => {
                    tracing::info!(path = %sql.display(), "Finished writing SQL");
                    Conversion::SqlDump(sql)
                },
                Err(e) => failed(path, e),
            });
        }
    }

    Ok(conversions)
}

fn failed(path: &Path, error: NormalizeError) -> Conversion {
    tracing::warn!(path = %path.display(), error = ?error, "Post-processing failed; keeping the copied file");
    Conversion::Failed(path.to_path_buf())
}

/// `<path>.sql`, keeping the original extension.
fn sql_path(path: &Path) -> PathBuf {
    let mut sql = path.as_os_str().to_owned();
    sql.push(".sql");
    PathBuf::from(sql)
}
