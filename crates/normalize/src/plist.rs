//! Property list rewriting.
//!
//! Binary property lists are unreadable in a diff, so they're rewritten as
//! XML. Keyed archives (`NSKeyedArchiver` output) contain `UID` values,
//! which only exist in the binary format; they're replaced with the
//! `{"CF$UID": n}` dictionaries that `plutil` produces for them.

use exn::ResultExt;
use plist::{Dictionary, Value};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{ErrorKind, Result};

/// Key used to represent a `UID` in formats that have no native UID type.
pub const UID_KEY: &str = "CF$UID";

/// Replace every `UID` in `value`, recursively, with `{"CF$UID": <integer>}`.
///
/// Everything else is returned as is, including dictionary key order.
pub fn flatten_uids(value: Value) -> Value {
    match value {
        Value::Uid(uid) => {
            let mut dict = Dictionary::new();
            dict.insert(UID_KEY.to_string(), Value::Integer(uid.get().into()));
            Value::Dictionary(dict)
        },
        Value::Dictionary(dict) => Value::Dictionary(dict.into_iter().map(|(k, v)| (k, flatten_uids(v))).collect()),
        Value::Array(values) => Value::Array(values.into_iter().map(flatten_uids).collect()),
        other => other,
    }
}

/// Read the property list at `source` and write it to `target` as XML.
///
/// Without a `target` the source is converted in place. The output is
/// written to a temporary file next to the target and moved over it once
/// complete, so a failed conversion leaves the target as it was.
pub fn convert(source: &Path, target: Option<&Path>) -> Result<()> {
    let target = target.unwrap_or(source);
    let value = Value::from_file(source).or_raise(|| ErrorKind::InvalidPlist(source.to_path_buf()))?;
    let value = flatten_uids(value);

    let mut xml = Vec::new();
    value.to_writer_xml(&mut xml).or_raise(|| ErrorKind::InvalidPlist(source.to_path_buf()))?;
    // The XML writer doesn't end the document with a newline.
    xml.push(b'\n');

    let write = || -> std::io::Result<()> {
        let mut temp = NamedTempFile::new_in(parent_dir(target))?;
        temp.write_all(&xml)?;
        copy_permissions(source, &temp)?;
        temp.persist(target)?;
        Ok(())
    };
    write().or_raise(|| ErrorKind::Write(target.to_path_buf()))?;
    tracing::debug!(source = %source.display(), target = %target.display(), "Wrote XML property list");
    Ok(())
}

/// Directory a sibling temporary file should be created in.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Give `temp` the permissions of `from`, instead of the owner-only mode
/// temporary files are created with.
pub(crate) fn copy_permissions(from: &Path, temp: &NamedTempFile) -> std::io::Result<()> {
    let permissions = std::fs::metadata(from)?.permissions();
    temp.as_file().set_permissions(permissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::Uid;

    fn archive() -> Value {
        let mut object = Dictionary::new();
        object.insert("NS.string".to_string(), Value::String("hello".to_string()));
        object.insert("$class".to_string(), Value::Uid(Uid::new(2)));
        let mut top = Dictionary::new();
        top.insert("root".to_string(), Value::Uid(Uid::new(1)));
        let mut root = Dictionary::new();
        root.insert("$version".to_string(), Value::Integer(100000i64.into()));
        root.insert("$archiver".to_string(), Value::String("NSKeyedArchiver".to_string()));
        root.insert("$top".to_string(), Value::Dictionary(top));
        root.insert(
            "$objects".to_string(),
            Value::Array(vec![Value::String("$null".to_string()), Value::Dictionary(object)]),
        );
        Value::Dictionary(root)
    }

    fn uid_dict(n: u64) -> Value {
        let mut dict = Dictionary::new();
        dict.insert(UID_KEY.to_string(), Value::Integer(n.into()));
        Value::Dictionary(dict)
    }

    #[test]
    fn test_flatten_uids_recursively() {
        let flat = flatten_uids(archive());
        let root = flat.as_dictionary().unwrap();
        assert_eq!(root.get("$top").unwrap().as_dictionary().unwrap().get("root"), Some(&uid_dict(1)));
        let objects = root.get("$objects").unwrap().as_array().unwrap();
        assert_eq!(objects[1].as_dictionary().unwrap().get("$class"), Some(&uid_dict(2)));
        // Everything else is untouched, key order included.
        assert_eq!(root.keys().collect::<Vec<_>>(), ["$version", "$archiver", "$top", "$objects"]);
        assert_eq!(objects[0], Value::String("$null".to_string()));
        assert_eq!(root.get("$version"), Some(&Value::Integer(100000i64.into())));
    }

    #[test]
    fn test_flatten_uids_top_level() {
        assert_eq!(flatten_uids(Value::Uid(Uid::new(7))), uid_dict(7));
        assert_eq!(flatten_uids(Value::Boolean(true)), Value::Boolean(true));
    }

    #[test]
    fn test_convert_in_place() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("archive.plist");
        archive().to_file_binary(&path).unwrap();
        convert(&path, None).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("<?xml"));
        assert!(contents.contains("<key>CF$UID</key>"));
        assert_eq!(Value::from_file(&path).unwrap(), flatten_uids(archive()));
        // Nothing but the converted file is left behind.
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_convert_to_other_target() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("binary.plist");
        let target = temp_dir.path().join("xml.plist");
        archive().to_file_binary(&source).unwrap();
        let original = std::fs::read(&source).unwrap();
        convert(&source, Some(&target)).unwrap();
        assert_eq!(std::fs::read(&source).unwrap(), original);
        assert!(std::fs::read_to_string(&target).unwrap().starts_with("<?xml"));
    }

    #[test]
    fn test_convert_invalid_plist_leaves_file_alone() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("broken.plist");
        std::fs::write(&path, b"bplist00 but not really").unwrap();
        let err = convert(&path, None).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPlist(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"bplist00 but not really");
    }

    #[cfg(unix)]
    #[test]
    fn test_convert_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("prefs.plist");
        archive().to_file_binary(&path).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        convert(&path, None).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o644);
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("a/b.plist")), Path::new("a"));
        assert_eq!(parent_dir(Path::new("b.plist")), Path::new("."));
    }
}
