//! Catalog models.
//!
//! Only three catalog columns matter for a rebuild, but manifests carry more
//! (`flags`, and a `file` blob holding an archived property list of file
//! metadata) and newer iOS versions keep adding to them. Everything that
//! isn't one of the three required columns is kept as a dynamically typed
//! [`Value`], in table order.

use exn::{OptionExt, ResultExt};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::error::{Error, ErrorKind, Result};

/// A single SQLite value, tagged with its storage class.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}
impl Value {
    fn decode(row: &SqliteRow, index: usize) -> Result<Self> {
        let raw = row.try_get_raw(index).or_raise(|| ErrorKind::InvalidData("column value"))?;
        if raw.is_null() {
            return Ok(Self::Null);
        }
        // The value's own storage class, not the declared column type:
        // SQLite will happily store text in an INTEGER column.
        let class = raw.type_info().name().to_string();
        let value = match class.as_str() {
            "INTEGER" => Self::Integer(row.try_get(index).or_raise(|| ErrorKind::InvalidData("integer"))?),
            "REAL" => Self::Real(row.try_get(index).or_raise(|| ErrorKind::InvalidData("real"))?),
            "TEXT" => Self::Text(row.try_get(index).or_raise(|| ErrorKind::InvalidData("text"))?),
            _ => Self::Blob(row.try_get(index).or_raise(|| ErrorKind::InvalidData("blob"))?),
        };
        Ok(value)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }
}

/// Ordered mapping of column name to [`Value`].
///
/// Lookups are linear; a catalog row has a handful of columns at most.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns(Vec<(String, Value)>);
impl Columns {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl FromIterator<(String, Value)> for Columns {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One backed-up file, as recorded in the manifest's catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Content-address key; names the blob in the store.
    pub file_id: String,
    /// Logical namespace, e.g. `HomeDomain` or `AppDomain-com.app.Example`.
    pub domain: String,
    /// Slash-separated path within the domain. Empty for the domain root.
    pub relative_path: String,
    /// Every other catalog column, in table order.
    pub columns: Columns,
}
impl TryFrom<SqliteRow> for CatalogEntry {
    type Error = Error;
    fn try_from(row: SqliteRow) -> std::result::Result<Self, Self::Error> {
        let (mut file_id, mut domain, mut relative_path) = (None, None, None);
        let mut columns = Vec::with_capacity(row.columns().len().saturating_sub(3));
        for column in row.columns() {
            let value = Value::decode(&row, column.ordinal())?;
            match column.name() {
                "fileID" => file_id = Some(value),
                "domain" => domain = Some(value),
                "relativePath" => relative_path = Some(value),
                name => columns.push((name.to_string(), value)),
            }
        }
        Ok(Self {
            file_id: required_text(file_id, "fileID")?,
            domain: required_text(domain, "domain")?,
            relative_path: required_text(relative_path, "relativePath")?,
            columns: Columns(columns),
        })
    }
}

fn required_text(value: Option<Value>, column: &'static str) -> Result<String> {
    match value.ok_or_raise(|| ErrorKind::MissingColumn(column))? {
        Value::Text(s) => Ok(s),
        _ => exn::bail!(ErrorKind::InvalidData(column)),
    }
}
