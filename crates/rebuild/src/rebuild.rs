use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, TryStreamExt};
use std::path::PathBuf;
use std::pin::pin;
use unsync_manifest::{CatalogEntry, Source, files};
use unsync_normalize::{Classifier, MagicClassifier};
use unsync_store::BlobStore;

use crate::error::{ErrorKind, Result};
use crate::postprocess::{Conversion, postprocess};
use crate::target;

/// Settings shared by every file of a rebuild.
pub struct Context {
    /// Root of the rebuilt tree. Must already exist.
    pub target: PathBuf,
    /// Normalize copied files (see [`postprocess`](crate::postprocess())).
    pub postprocess: bool,
    pub classifier: Box<dyn Classifier>,
}
impl Context {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self { target: target.into(), postprocess: false, classifier: Box::new(MagicClassifier) }
    }

    pub fn with_postprocess(mut self, postprocess: bool) -> Self {
        self.postprocess = postprocess;
        self
    }

    pub fn with_classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }
}

/// What happened to a single catalog entry.
#[derive(Debug)]
pub enum Action {
    /// The entry's blob isn't in the backup; nothing was written.
    Skipped(CatalogEntry),
    /// The entry's domain or path would land outside the target tree (or on
    /// the domain directory itself); nothing was written.
    Rejected(CatalogEntry),
    /// The blob was copied to `path`, then post-processed if enabled.
    Copied { entry: CatalogEntry, path: PathBuf, conversions: Vec<Conversion> },
}

/// Progress events emitted by [`rebuild`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`Processed`](Self::Processed), once per catalog entry, in catalog
///    order.
/// 3. [`Complete`](Self::Complete), exactly once, with the final tally.
///
/// An error terminates the stream early, in which case [`Complete`](Self::Complete)
/// is never emitted.
#[derive(Debug)]
pub enum RebuildEvent {
    Started,
    Processed(Action),
    Complete(Summary),
}

/// Counters for a finished rebuild.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[display(
    "{copied} copied, {skipped} skipped, {rejected} rejected, {converted} converted, {conversion_failures} conversion failures"
)]
pub struct Summary {
    pub copied: u64,
    /// Entries whose blob is missing from the backup.
    pub skipped: u64,
    pub rejected: u64,
    /// Plists rewritten plus databases dumped.
    pub converted: u64,
    pub conversion_failures: u64,
}
impl Summary {
    fn record(&mut self, action: &Action) {
        match action {
            Action::Skipped(_) => self.skipped += 1,
            Action::Rejected(_) => self.rejected += 1,
            Action::Copied { conversions, .. } => {
                self.copied += 1;
                for conversion in conversions {
                    match conversion {
                        Conversion::Plist(_) | Conversion::SqlDump(_) => self.converted += 1,
                        Conversion::Failed(_) => self.conversion_failures += 1,
                        Conversion::SqlDumpExists(_) => {},
                    }
                }
            },
        }
    }
}

/// Streams [`RebuildEvent`]s while copying every file of a backup (or of a
/// single `domain`) into `ctx.target`.
///
/// Entries are processed one at a time, in catalog order (domain, then
/// relative path). Missing blobs and unsafe paths are reported as actions,
/// not errors. Catalog failures and I/O failures while writing the tree are
/// fatal: the error is yielded and the stream ends, leaving already copied
/// files in place.
pub fn rebuild<'a>(
    source: impl Into<Source<'a>>,
    domain: Option<&'a str>,
    ctx: &'a Context,
) -> impl Stream<Item = Result<RebuildEvent>> + 'a {
    let source = source.into();
    let store = BlobStore::for_manifest(source.path());
    stream! {
        tracing::info!(store = %store.root().display(), target = %ctx.target.display(), domain, "Rebuilding backup");
        yield Ok(RebuildEvent::Started);

        let mut summary = Summary::default();
        for await entry in files(source, domain) {
            let entry = match entry.or_raise(|| ErrorKind::Catalog) {
                Ok(entry) => entry,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            match rebuild_file(&store, ctx, entry).await {
                Ok(action) => {
                    summary.record(&action);
                    yield Ok(RebuildEvent::Processed(action));
                },
                Err(e) => {
                    yield Err(e);
                    return;
                },
            }
        }

        tracing::info!(%summary, "Rebuild complete");
        yield Ok(RebuildEvent::Complete(summary));
    }
}

/// Copy a single catalog entry's blob into the target tree.
pub async fn rebuild_file(store: &BlobStore, ctx: &Context, entry: CatalogEntry) -> Result<Action> {
    if !store.exists(&entry.file_id).await.or_raise(|| ErrorKind::Storage)? {
        tracing::debug!(file_id = %entry.file_id, relative_path = %entry.relative_path, "Blob not in backup; skipping");
        return Ok(Action::Skipped(entry));
    }

    let path = match target::destination(&ctx.target, &entry.domain, &entry.relative_path) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(
                file_id = %entry.file_id,
                domain = %entry.domain,
                relative_path = %entry.relative_path,
                error = ?e,
                "Refusing to write outside the target directory",
            );
            return Ok(Action::Rejected(entry));
        },
    };

    target::copy(&store.resolve(&entry.file_id), &path).await?;
    tracing::info!(file_id = %entry.file_id, path = %path.display(), "Copied");

    let conversions =
        if ctx.postprocess { postprocess(&path, ctx.classifier.as_ref()).await? } else { Vec::new() };
    Ok(Action::Copied { entry, path, conversions })
}

/// Run [`rebuild`] to completion and return its [`Summary`].
pub async fn rebuild_all<'a>(
    source: impl Into<Source<'a>>,
    domain: Option<&'a str>,
    ctx: &'a Context,
) -> Result<Summary> {
    let mut events = pin!(rebuild(source, domain, ctx));
    let mut summary = Summary::default();
    while let Some(event) = events.try_next().await? {
        if let RebuildEvent::Complete(complete) = event {
            summary = complete;
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::ops::Deref;
    use std::path::Path;
    use unsync_manifest::fixture::BackupFixture;

    const DOMAIN: &str = "AppDomain-com.app.Example";

    /// Every file under `root`, keyed by its path relative to `root`.
    fn tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        fn walk(root: &Path, dir: &Path, files: &mut BTreeMap<PathBuf, Vec<u8>>) {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(root, &path, files);
                } else {
                    files.insert(path.strip_prefix(root).unwrap().to_path_buf(), std::fs::read(&path).unwrap());
                }
            }
        }
        let mut files = BTreeMap::new();
        walk(root, root, &mut files);
        files
    }

    struct Setup {
        _temp_dir: tempfile::TempDir,
        fixture: BackupFixture,
        output: PathBuf,
    }

    async fn setup() -> Setup {
        let temp_dir = tempfile::tempdir().unwrap();
        let backup = temp_dir.path().join("backup");
        let output = temp_dir.path().join("output");
        std::fs::create_dir_all(&backup).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        let fixture = BackupFixture::new(&backup).await;
        Setup { _temp_dir: temp_dir, fixture, output }
    }

    #[tokio::test]
    async fn test_rebuild_copies_present_blob() {
        let Setup { fixture, output, _temp_dir } = setup().await;
        fixture.add(DOMAIN, "Documents/notes.txt", Some(b"hello")).await;
        let ctx = Context::new(&output);
        let summary = rebuild_all(fixture.manifest(), None, &ctx).await.unwrap();
        assert_eq!(summary, Summary { copied: 1, ..Summary::default() });
        assert_eq!(std::fs::read(output.join(DOMAIN).join("Documents/notes.txt")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_rebuild_skips_missing_blob() {
        let Setup { fixture, output, _temp_dir } = setup().await;
        fixture.add(DOMAIN, "Documents/notes.txt", None).await;
        let ctx = Context::new(&output);
        let summary = rebuild_all(fixture.manifest(), None, &ctx).await.unwrap();
        assert_eq!(summary, Summary { skipped: 1, ..Summary::default() });
        assert!(tree(&output).is_empty());
        assert!(!output.join(DOMAIN).exists());
    }

    #[tokio::test]
    async fn test_rebuild_events_in_order() {
        let Setup { fixture, output, _temp_dir } = setup().await;
        fixture.add("HomeDomain", "Library/a.txt", Some(b"a")).await;
        fixture.add(DOMAIN, "Documents/b.txt", None).await;
        fixture.add(DOMAIN, "Documents/a.txt", Some(b"b")).await;
        let ctx = Context::new(&output);
        let events: Vec<RebuildEvent> = rebuild(fixture.manifest(), None, &ctx).try_collect().await.unwrap();
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], RebuildEvent::Started));
        let processed: Vec<&str> = events[1..4]
            .iter()
            .map(|event| match event {
                RebuildEvent::Processed(Action::Copied { entry, .. } | Action::Skipped(entry)) => {
                    entry.relative_path.as_str()
                },
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(processed, ["Documents/a.txt", "Documents/b.txt", "Library/a.txt"]);
        assert!(matches!(events[4], RebuildEvent::Complete(Summary { copied: 2, skipped: 1, .. })));
    }

    #[tokio::test]
    async fn test_rebuild_single_domain() {
        let Setup { fixture, output, _temp_dir } = setup().await;
        fixture.add("HomeDomain", "Library/a.txt", Some(b"a")).await;
        fixture.add(DOMAIN, "Documents/notes.txt", Some(b"notes")).await;
        let ctx = Context::new(&output);
        let summary = rebuild_all(fixture.manifest(), Some(DOMAIN), &ctx).await.unwrap();
        assert_eq!(summary.copied, 1);
        assert_eq!(tree(&output).into_keys().collect::<Vec<_>>(), [Path::new(DOMAIN).join("Documents/notes.txt")]);
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let Setup { fixture, output, _temp_dir } = setup().await;
        fixture.add("HomeDomain", "Library/Preferences/a.plist", Some(b"plist")).await;
        fixture.add(DOMAIN, "Documents/notes.txt", Some(b"notes")).await;
        fixture.add(DOMAIN, "Documents/missing.txt", None).await;
        let ctx = Context::new(&output);

        let first_summary = rebuild_all(fixture.manifest(), None, &ctx).await.unwrap();
        let first = tree(&output);
        let path = output.join(DOMAIN).join("Documents/notes.txt");
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

        let second_summary = rebuild_all(fixture.manifest(), None, &ctx).await.unwrap();
        assert_eq!(first_summary, second_summary);
        assert_eq!(tree(&output), first);
        assert_eq!(first.len(), 2);
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }

    #[tokio::test]
    async fn test_rebuild_keeps_blob_modification_time() {
        let Setup { fixture, output, _temp_dir } = setup().await;
        let id = fixture.add(DOMAIN, "Documents/notes.txt", Some(b"notes")).await;
        let blob = BlobStore::for_manifest(fixture.manifest()).resolve(&id);
        let ctx = Context::new(&output);
        rebuild_all(fixture.manifest(), None, &ctx).await.unwrap();
        let copied = std::fs::metadata(output.join(DOMAIN).join("Documents/notes.txt")).unwrap();
        assert_eq!(copied.modified().unwrap(), std::fs::metadata(blob).unwrap().modified().unwrap());
    }

    #[tokio::test]
    async fn test_rebuild_rejects_escaping_paths() {
        let Setup { fixture, output, _temp_dir } = setup().await;
        fixture.add(DOMAIN, "../../escaped.txt", Some(b"nope")).await;
        fixture.add(DOMAIN, "", Some(b"directory record")).await;
        fixture.add(DOMAIN, "Documents/ok.txt", Some(b"ok")).await;
        let ctx = Context::new(&output);
        let summary = rebuild_all(fixture.manifest(), None, &ctx).await.unwrap();
        assert_eq!(summary, Summary { copied: 1, rejected: 2, ..Summary::default() });
        assert_eq!(tree(&output).len(), 1);
        assert!(!output.parent().unwrap().join("escaped.txt").exists());
    }

    #[tokio::test]
    async fn test_rebuild_write_failure_ends_stream() {
        let Setup { fixture, output, _temp_dir } = setup().await;
        fixture.add("HomeDomain", "Library/a.txt", Some(b"a")).await;
        fixture.add(DOMAIN, "Documents/notes.txt", Some(b"notes")).await;
        // A file where the second domain's directory should go.
        std::fs::write(output.join("HomeDomain"), b"in the way").unwrap();
        let ctx = Context::new(&output);

        let mut events = pin!(rebuild(fixture.manifest(), None, &ctx));
        assert!(matches!(events.try_next().await.unwrap(), Some(RebuildEvent::Started)));
        assert!(matches!(events.try_next().await.unwrap(), Some(RebuildEvent::Processed(Action::Copied { .. }))));
        let err = events.try_next().await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Storage));
        assert!(events.try_next().await.unwrap().is_none());
        // Files copied before the failure stay.
        assert_eq!(std::fs::read(output.join(DOMAIN).join("Documents/notes.txt")).unwrap(), b"notes");
    }

    #[tokio::test]
    async fn test_rebuild_missing_manifest_is_catalog_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(temp_dir.path());
        let err = rebuild_all(temp_dir.path().join("Manifest.db"), None, &ctx).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Catalog));
    }

    #[tokio::test]
    async fn test_rebuild_with_postprocessing() {
        let Setup { fixture, output, _temp_dir } = setup().await;
        let mut archive = plist::Dictionary::new();
        archive.insert("root".to_string(), plist::Value::Uid(plist::Uid::new(1)));
        let mut binary = Vec::new();
        plist::Value::Dictionary(archive).to_writer_binary(&mut binary).unwrap();
        fixture.add(DOMAIN, "Library/Preferences/com.app.Example.plist", Some(binary.as_slice())).await;
        fixture.add(DOMAIN, "Library/broken.db", Some(b"SQLite format 3\0 but truncated")).await;
        fixture.add(DOMAIN, "Documents/notes.txt", Some(b"notes")).await;
        let ctx = Context::new(&output).with_postprocess(true);

        let summary = rebuild_all(fixture.manifest(), None, &ctx).await.unwrap();
        assert_eq!(summary, Summary { copied: 3, converted: 1, conversion_failures: 1, ..Summary::default() });
        let plist = std::fs::read_to_string(output.join(DOMAIN).join("Library/Preferences/com.app.Example.plist")).unwrap();
        assert!(plist.contains("<key>CF$UID</key>"));
        assert!(!output.join(DOMAIN).join("Library/broken.db.sql").exists());
        assert_eq!(std::fs::read(output.join(DOMAIN).join("Documents/notes.txt")).unwrap(), b"notes");
    }

    #[test]
    fn test_summary_display() {
        let summary = Summary { copied: 3, skipped: 2, rejected: 0, converted: 1, conversion_failures: 0 };
        assert_eq!(
            summary.to_string(),
            "3 copied, 2 skipped, 0 rejected, 1 converted, 0 conversion failures"
        );
    }
}
