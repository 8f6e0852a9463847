//! Lazy catalog queries.
//!
//! Both queries return a [`Stream`] that pulls rows from SQLite only as the
//! caller consumes them. Streams are single pass: run the query again to
//! start over.

use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use sqlx::Sqlite;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use std::path::{Path, PathBuf};

use crate::db::Manifest;
use crate::error::{ErrorKind, Result};
use crate::models::CatalogEntry;

// The `Files` table name is fixed by the backup format; see `db::TABLE`.
const DOMAINS: &str = r#"
    SELECT domain
    FROM Files
    GROUP BY domain
    ORDER BY domain ASC
"#;
const FILES: &str = r#"
    SELECT *
    FROM Files
    WHERE ?1 IS NULL OR domain = ?1
    ORDER BY domain ASC, relativePath ASC
"#;

/// Where a query gets its connection from.
pub enum Source<'a> {
    /// Open a connection for this query only, and close it when the stream
    /// is exhausted or dropped.
    Path(PathBuf),
    /// Borrow an already open manifest. The connection stays open afterwards.
    Open(&'a mut Manifest),
}
impl Source<'_> {
    pub fn path(&self) -> &Path {
        match self {
            Self::Path(path) => path,
            Self::Open(manifest) => manifest.path(),
        }
    }
}
impl From<&Path> for Source<'_> {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}
impl From<&PathBuf> for Source<'_> {
    fn from(path: &PathBuf) -> Self {
        Self::Path(path.clone())
    }
}
impl From<PathBuf> for Source<'_> {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}
impl<'a> From<&'a mut Manifest> for Source<'a> {
    fn from(manifest: &'a mut Manifest) -> Self {
        Self::Open(manifest)
    }
}

enum Statement<'a> {
    Domains,
    Files { domain: Option<&'a str> },
}
impl<'a> Statement<'a> {
    fn query(&self) -> Query<'a, Sqlite, SqliteArguments<'a>> {
        match *self {
            Self::Domains => sqlx::query(DOMAINS),
            Self::Files { domain } => sqlx::query(FILES).bind(domain),
        }
    }
}

/// Distinct domains in the catalog, in ascending order.
///
/// # Examples
///
/// ```no_run
/// use futures::TryStreamExt;
/// use std::path::Path;
/// # async fn example() -> unsync_manifest::error::Result<()> {
/// let mut domains = std::pin::pin!(unsync_manifest::domains(Path::new("Manifest.db")));
/// while let Some(domain) = domains.try_next().await? {
///     println!("{domain}");
/// }
/// # Ok(())
/// # }
/// ```
pub fn domains<'a>(source: impl Into<Source<'a>>) -> impl Stream<Item = Result<String>> + 'a {
    rows(source.into(), Statement::Domains, |row| {
        sqlx::Row::try_get::<String, _>(&row, 0).or_raise(|| ErrorKind::InvalidData("domain"))
    })
}

/// Catalog entries ordered by domain, then relative path (both ascending).
///
/// With `domain` set, only entries whose domain matches it exactly are
/// returned.
///
/// # Examples
///
/// Batching several queries on one connection:
///
/// ```no_run
/// use futures::TryStreamExt;
/// use unsync_manifest::Manifest;
/// # async fn example() -> unsync_manifest::error::Result<()> {
/// let mut manifest = Manifest::open("Manifest.db").await?;
/// let domains: Vec<String> = unsync_manifest::domains(&mut manifest).try_collect().await?;
/// for domain in &domains {
///     let count = unsync_manifest::files(&mut manifest, Some(domain.as_str())).try_collect::<Vec<_>>().await?.len();
///     println!("{domain}: {count}");
/// }
/// manifest.close().await;
/// # Ok(())
/// # }
/// ```
pub fn files<'a>(
    source: impl Into<Source<'a>>,
    domain: Option<&'a str>,
) -> impl Stream<Item = Result<CatalogEntry>> + 'a {
    rows(source.into(), Statement::Files { domain }, CatalogEntry::try_from)
}

fn rows<'a, T: 'a>(
    source: Source<'a>,
    statement: Statement<'a>,
    decode: fn(SqliteRow) -> Result<T>,
) -> impl Stream<Item = Result<T>> + 'a {
    // Any error ends the stream: there's no sensible way to carry on reading
    // a cursor that has failed once.
    stream!({
        let mut opened = None;
        let manifest = match source {
            Source::Open(manifest) => manifest,
            Source::Path(path) => match Manifest::open(&path).await {
                Ok(manifest) => opened.insert(manifest),
                Err(e) => {
                    yield Err(e);
                    return;
                },
            },
        };

        let mut count: u64 = 0;
        let mut cursor = statement.query().fetch(manifest.connection());
        while let Some(row) = cursor.next().await {
            match row.or_raise(|| ErrorKind::Query).and_then(decode) {
                Ok(item) => {
                    count += 1;
                    yield Ok(item);
                },
                Err(e) => {
                    yield Err(e);
                    return;
                },
            }
        }
        drop(cursor);
        tracing::debug!(rows = count, "Catalog query exhausted");

        // Only close what we opened. A dropped stream drops `opened` (and its
        // connection) along with it.
        if let Some(manifest) = opened {
            manifest.close().await;
        }
    })
}
