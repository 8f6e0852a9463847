//! On-disk backup fixtures for tests.
//!
//! Builds a `Manifest.db` with the same `Files` schema a real backup uses,
//! plus the sharded blob directory next to it.
//!
//! Not gated behind `#[cfg(test)]` so that other crates can use it in their
//! tests (via the `fixture` feature). Every method panics on failure: if the
//! test setup is wrong, the test should not pass.

use crate::hash::file_id;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, SqliteConnection};
use std::path::{Path, PathBuf};

const SCHEMA: &str = r#"
    CREATE TABLE Files (fileID TEXT PRIMARY KEY, domain TEXT, relativePath TEXT, flags INTEGER, file BLOB);
    CREATE INDEX FilesDomainIdx ON Files(domain);
    CREATE INDEX FilesRelativePathIdx ON Files(relativePath);
    CREATE TABLE Properties (key TEXT PRIMARY KEY, value BLOB);
"#;

/// A backup directory: `Manifest.db` plus blobs.
pub struct BackupFixture {
    root: PathBuf,
    manifest: PathBuf,
}

impl BackupFixture {
    /// Create an empty manifest in `root` (which must already exist).
    pub async fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let manifest = root.join("Manifest.db");
        let mut conn = Self::connect(&manifest, true).await;
        sqlx::raw_sql(SCHEMA).execute(&mut conn).await.expect("fixture schema");
        conn.close().await.expect("fixture close");
        Self { root, manifest }
    }

    async fn connect(path: &Path, create: bool) -> SqliteConnection {
        SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create)
            .connect()
            .await
            .expect("fixture connection")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &Path {
        &self.manifest
    }

    /// Add a catalog entry, and its blob when `blob` is given. Returns the
    /// entry's `fileID`.
    pub async fn add(&self, domain: &str, relative_path: &str, blob: Option<&[u8]>) -> String {
        let id = file_id(domain, relative_path);
        let mut conn = Self::connect(&self.manifest, false).await;
        sqlx::query("INSERT INTO Files (fileID, domain, relativePath, flags, file) VALUES (?1, ?2, ?3, 1, ?4)")
            .bind(&id)
            .bind(domain)
            .bind(relative_path)
            .bind(b"bplist00".as_slice())
            .execute(&mut conn)
            .await
            .expect("fixture insert");
        conn.close().await.expect("fixture close");
        if let Some(data) = blob {
            self.write_blob(&id, data);
        }
        id
    }

    /// Write a blob into the store without touching the catalog.
    pub fn write_blob(&self, file_id: &str, data: &[u8]) -> PathBuf {
        let shard = self.root.join(&file_id[..2]);
        std::fs::create_dir_all(&shard).expect("fixture shard directory");
        let path = shard.join(file_id);
        std::fs::write(&path, data).expect("fixture blob");
        path
    }
}
