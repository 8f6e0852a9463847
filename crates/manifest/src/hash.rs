use sha1::{Digest, Sha1};

/// Compute the `fileID` a backup would assign to `relative_path` in `domain`.
///
/// The catalog stores this value; nothing in the rebuild pipeline recomputes
/// or verifies it. Useful for locating a single known file in a backup
/// without querying the manifest at all.
///
/// ```
/// use unsync_manifest::file_id;
/// assert_eq!(file_id("HomeDomain", "Library/SMS/sms.db"), "3d0d7e5fb2ce288813306e4d4636395e047a3d28");
/// ```
pub fn file_id(domain: &str, relative_path: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(domain.as_bytes());
    hasher.update(b"-");
    hasher.update(relative_path.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("HomeDomain", "Library/SMS/sms.db", "3d0d7e5fb2ce288813306e4d4636395e047a3d28")]
    #[case("", "", "3bc15c8aae3e4124dd409035f32ea2fd6835efc9")]
    fn test_file_id(#[case] domain: &str, #[case] path: &str, #[case] expected: &str) {
        assert_eq!(file_id(domain, path), expected);
    }

    #[test]
    fn test_file_id_shape() {
        let id = file_id("AppDomain-com.app.Example", "Documents/notes.txt");
        assert_eq!(id.len(), 40);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
