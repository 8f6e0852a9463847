//! Content sniffing.
//!
//! Only a handful of formats matter to post-processing (binary property
//! lists and SQLite databases); the rest of the table exists so that log
//! output says something more useful than "data".

use async_trait::async_trait;
use exn::ResultExt;
use std::path::Path;
use tokio::io::AsyncReadExt;

use crate::error::{ErrorKind, Result};

/// Number of leading bytes read from a file to classify it.
const HEAD_LEN: u64 = 512;

const BPLIST_MAGIC: &[u8] = b"bplist00";
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const GIF87_MAGIC: &[u8] = b"GIF87a";
const GIF89_MAGIC: &[u8] = b"GIF89a";
const PDF_MAGIC: &[u8] = b"%PDF-";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
const XML_MAGIC: &[u8] = b"<?xml";

/// What a file looks like, in the same terms as libmagic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMagic {
    pub mime_type: &'static str,
    pub encoding: &'static str,
    /// Human readable description, e.g. `Apple binary property list`.
    pub name: &'static str,
}

impl FileMagic {
    /// The answer when nothing better is known.
    pub const DEFAULT: Self = Self::new("application/octet-stream", "binary", "data");

    pub const BINARY_PLIST: Self = Self::new("application/x-bplist", "binary", "Apple binary property list");
    pub const SQLITE: Self = Self::new("application/x-sqlite3", "binary", "SQLite 3.x database");

    const fn new(mime_type: &'static str, encoding: &'static str, name: &'static str) -> Self {
        Self { mime_type, encoding, name }
    }

    /// Detect file type from the first few bytes of a file.
    ///
    /// Returns [`DEFAULT`](Self::DEFAULT) when no signature matches and the
    /// input doesn't look like text.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Self {
        const SIGNATURES: [(&[u8], FileMagic); 9] = [
            (BPLIST_MAGIC, FileMagic::BINARY_PLIST),
            (SQLITE_MAGIC, FileMagic::SQLITE),
            (PNG_MAGIC, FileMagic::new("image/png", "binary", "PNG image data")),
            (JPEG_MAGIC, FileMagic::new("image/jpeg", "binary", "JPEG image data")),
            (GIF87_MAGIC, FileMagic::new("image/gif", "binary", "GIF image data")),
            (GIF89_MAGIC, FileMagic::new("image/gif", "binary", "GIF image data")),
            (PDF_MAGIC, FileMagic::new("application/pdf", "binary", "PDF document")),
            (ZIP_MAGIC, FileMagic::new("application/zip", "binary", "Zip archive data")),
            (GZIP_MAGIC, FileMagic::new("application/gzip", "binary", "gzip compressed data")),
        ];
        if bytes.is_empty() {
            return Self::new("inode/x-empty", "binary", "empty");
        }
        if let Some((_, magic)) = SIGNATURES.iter().find(|(signature, _)| bytes.starts_with(signature)) {
            return *magic;
        }
        match text_encoding(bytes) {
            Some(encoding) if bytes.starts_with(XML_MAGIC) => Self::new("text/xml", encoding, "XML 1.0 document"),
            Some("us-ascii") => Self::new("text/plain", "us-ascii", "ASCII text"),
            Some(encoding) => Self::new("text/plain", encoding, "Unicode text, UTF-8 text"),
            None => Self::DEFAULT,
        }
    }
}
impl Default for FileMagic {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn text_encoding(bytes: &[u8]) -> Option<&'static str> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        // A head cut off in the middle of a multi-byte character is still text.
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&bytes[..e.valid_up_to()]).ok()?,
        Err(_) => return None,
    };
    if text.chars().any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\x0C')) {
        return None;
    }
    Some(if text.is_ascii() { "us-ascii" } else { "utf-8" })
}

/// Decides what kind of file a path holds.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the file at `path`, failing if it can't be inspected.
    async fn detect(&self, path: &Path) -> Result<FileMagic>;

    /// Classify the file at `path`, never failing.
    ///
    /// Any detection error is logged and answered with
    /// [`FileMagic::DEFAULT`], so callers only ever deal with a type.
    async fn classify(&self, path: &Path) -> FileMagic {
        match self.detect(path).await {
            Ok(magic) => magic,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = ?e, "Failed to classify file; using fallback");
                FileMagic::DEFAULT
            },
        }
    }
}

/// Classifies files by their leading bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct MagicClassifier;

#[async_trait]
impl Classifier for MagicClassifier {
    async fn detect(&self, path: &Path) -> Result<FileMagic> {
        let file = tokio::fs::File::open(path).await.or_raise(|| ErrorKind::Classification(path.to_path_buf()))?;
        let mut head = Vec::with_capacity(HEAD_LEN as usize);
        file.take(HEAD_LEN)
            .read_to_end(&mut head)
            .await
            .or_raise(|| ErrorKind::Classification(path.to_path_buf()))?;
        Ok(FileMagic::from_magic_bytes(&head))
    }
}
