//! Manifest database connection.

use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Name of the catalog table inside `Manifest.db`.
pub(crate) const TABLE: &str = "Files";
/// Columns the rebuild pipeline cannot work without. Anything else in the
/// table is carried along untouched.
const REQUIRED_COLUMNS: [&str; 3] = ["fileID", "domain", "relativePath"];

/// An open, read-only handle to a backup's `Manifest.db`.
///
/// Opening a handle up front lets callers run several queries on one
/// connection (see [`Source::Open`](crate::Source::Open)); the query
/// functions will otherwise open and close a connection of their own.
#[derive(Debug)]
pub struct Manifest {
    conn: SqliteConnection,
    path: PathBuf,
}

impl Manifest {
    /// Open the manifest at `path` and check that it has a usable catalog.
    ///
    /// The database is never created and never written to. Fails with
    /// [`ErrorKind::Storage`] when the file can't be opened as SQLite or the
    /// `Files` table (or one of its required columns) is missing.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut conn = Self::options(path).connect().await.or_raise(|| ErrorKind::Storage)?;
        if let Err(e) = Self::verify(&mut conn).await {
            _ = conn.close().await;
            return Err(e).or_raise(|| ErrorKind::Storage);
        }
        Ok(Self { conn, path: path.to_path_buf() })
    }

    fn options(path: &Path) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(path)
            // A typo in the path should be an error, not an empty manifest.
            .create_if_missing(false)
            .read_only(true)
    }

    async fn verify(conn: &mut SqliteConnection) -> Result<()> {
        let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?1)")
            .bind(TABLE)
            .fetch_all(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Query)?;
        if columns.is_empty() {
            exn::bail!(ErrorKind::MissingTable(TABLE));
        }
        for required in REQUIRED_COLUMNS {
            if !columns.iter().any(|c| c == required) {
                exn::bail!(ErrorKind::MissingColumn(required));
            }
        }
        Ok(())
    }

    /// Location the manifest was opened from. The blob store lives next to it.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Close the underlying connection.
    ///
    /// Dropping a `Manifest` also closes it; this just lets the caller wait
    /// for the close to finish.
    pub async fn close(self) {
        _ = self.conn.close().await;
    }
}
