//! SQLite text dumps.
//!
//! Produces the same statements as the `sqlite3` shell's `.dump` command
//! (as implemented by Python's `Connection.iterdump`), one per line, so that
//! a dump can be loaded straight back into `sqlite3`.

use async_stream::try_stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::pin::pin;
use tempfile::NamedTempFile;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::plist::{copy_permissions, parent_dir};

const MASTER: &str = "sqlite_master";
const TABLES: &str = r#"
    SELECT "name", "type", "sql"
    FROM "sqlite_master"
    WHERE "sql" NOT NULL AND "type" == 'table'
    ORDER BY "name"
"#;
const OTHER_OBJECTS: &str = r#"
    SELECT "name", "type", "sql"
    FROM "sqlite_master"
    WHERE "sql" NOT NULL AND "type" IN ('index', 'trigger', 'view')
"#;

/// Open the database at `path` without any chance of modifying it.
///
/// `immutable` also stops SQLite from creating `-wal`/`-shm` files next to
/// it, which would otherwise end up in the rebuilt tree.
async fn connect(path: &Path) -> Result<SqliteConnection> {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(false)
        .read_only(true)
        .immutable(true)
        .connect()
        .await
        .or_raise(|| ErrorKind::Database(path.to_path_buf()))
}

/// Quote an identifier for use inside double quotes.
fn ident(name: &str) -> String {
    name.replace('"', "\"\"")
}

/// `text` as a single-quoted SQL string literal.
fn literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Statement that renders every row of `table` as an `INSERT` statement,
/// letting SQLite's `quote()` produce the literals.
///
/// Names are only ever embedded as quoted identifiers or inside literals,
/// so any table or column name works.
fn insert_query(table: &str, columns: &[String]) -> String {
    let prefix = literal(&format!(r#"INSERT INTO "{}" VALUES("#, ident(table)));
    let values: Vec<String> = columns.iter().map(|c| format!(r#"quote("{}")"#, ident(c))).collect();
    format!(
        r#"SELECT {prefix}||{values}||')' FROM "{table}";"#,
        values = values.join("||','||"),
        table = ident(table),
    )
}

/// Every statement of the dump, in order, without trailing newlines.
///
/// Any error ends the stream.
pub fn statements(conn: &mut SqliteConnection) -> impl Stream<Item = Result<String>> + '_ {
    try_stream!({
        yield "BEGIN TRANSACTION;".to_string();

        let tables: Vec<(String, String, String)> =
            sqlx::query_as(TABLES).fetch_all(&mut *conn).await.or_raise(|| ErrorKind::Database(MASTER.into()))?;
        let mut sequence = Vec::new();
        let mut writable_schema = false;
        for (name, _, sql) in tables {
            if name == "sqlite_sequence" {
                let rows: Vec<(String, i64)> = sqlx::query_as(r#"SELECT * FROM "sqlite_sequence";"#)
                    .fetch_all(&mut *conn)
                    .await
                    .or_raise(|| ErrorKind::Database(name.clone().into()))?;
                sequence.push(r#"DELETE FROM "sqlite_sequence";"#.to_string());
                sequence.extend(
                    rows.into_iter()
                        .map(|(table, seq)| format!(r#"INSERT INTO "sqlite_sequence" VALUES({},{seq});"#, literal(&table))),
                );
                continue;
            } else if name == "sqlite_stat1" {
                yield r#"ANALYZE "sqlite_master";"#.to_string();
            } else if name.starts_with("sqlite_") {
                continue;
            } else if sql.starts_with("CREATE VIRTUAL TABLE") {
                if !writable_schema {
                    writable_schema = true;
                    yield "PRAGMA writable_schema=ON;".to_string();
                }
                let quoted = literal(&name);
                yield format!(
                    "INSERT INTO sqlite_master(type,name,tbl_name,rootpage,sql)VALUES('table',{quoted},{quoted},0,{});",
                    literal(&sql),
                );
            } else {
                yield format!("{sql};");
            }

            let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?1)")
                .bind(&name)
                .fetch_all(&mut *conn)
                .await
                .or_raise(|| ErrorKind::Database(name.clone().into()))?;
            let query = insert_query(&name, &columns);
            let mut rows = sqlx::query_scalar::<_, String>(&query).fetch(&mut *conn);
            while let Some(row) = rows.next().await {
                let row = row.or_raise(|| ErrorKind::Database(name.clone().into()))?;
                yield format!("{row};");
            }
        }

        let objects: Vec<(String, String, String)> =
            sqlx::query_as(OTHER_OBJECTS).fetch_all(&mut *conn).await.or_raise(|| ErrorKind::Database(MASTER.into()))?;
        for (_, _, sql) in objects {
            yield format!("{sql};");
        }
        if writable_schema {
            yield "PRAGMA writable_schema=OFF;".to_string();
        }
        for statement in sequence {
            yield statement;
        }
        yield "COMMIT;".to_string();
    })
}

/// Dump the database at `database` as SQL text into `target`.
///
/// Never overwrites: fails with [`ErrorKind::AlreadyExists`] if `target`
/// exists by the time the dump is complete. Nothing is left at `target` if
/// the dump fails part way.
#[instrument(level = "debug", skip_all, fields(database = %database.display()))]
pub async fn dump_to_file(database: &Path, target: &Path) -> Result<()> {
    let mut conn = connect(database).await?;
    let result = write_statements(&mut conn, target).await;
    _ = conn.close().await;
    let temp = result?;
    copy_permissions(database, &temp).or_raise(|| ErrorKind::Write(target.to_path_buf()))?;

    match temp.persist_noclobber(target) {
        Ok(_) => {},
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            exn::bail!(ErrorKind::AlreadyExists(target.to_path_buf()))
        },
        Err(e) => return Err(e.error).or_raise(|| ErrorKind::Write(target.to_path_buf())),
    }
    tracing::debug!(target = %target.display(), "Wrote SQL dump");
    Ok(())
}

async fn write_statements(conn: &mut SqliteConnection, target: &Path) -> Result<NamedTempFile> {
    let temp = NamedTempFile::new_in(parent_dir(target)).or_raise(|| ErrorKind::Write(target.to_path_buf()))?;
    let mut writer = BufWriter::new(temp);
    let mut lines = pin!(statements(conn));
    while let Some(line) = lines.next().await {
        writeln!(writer, "{}", line?).or_raise(|| ErrorKind::Write(target.to_path_buf()))?;
    }
    writer.into_inner().or_raise(|| ErrorKind::Write(target.to_path_buf()))
}
