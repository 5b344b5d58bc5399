use dupdup::duplicates::{DuplicateFinder, FinderConfig, FinderError};
use dupdup::scanner::{ContentDigest, Hash, HashError, Hasher, ScanError};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

use super::fixtures::{tree_with_doomed_dir, VanishingDirDigest};

/// Fails for any file whose name starts with `bad`.
struct FlakyDigest(Hasher);

impl ContentDigest for FlakyDigest {
    fn digest(&self, path: &Path) -> Result<Hash, HashError> {
        let name = path.file_name().unwrap().to_string_lossy();
        if name.starts_with("bad") {
            return Err(HashError::from_io(
                path.to_path_buf(),
                std::io::Error::other("simulated read failure"),
            ));
        }
        self.0.digest(path)
    }
}

#[test]
fn test_digest_failures_do_not_abort_scan() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("good1"), b"identical").unwrap();
    fs::write(dir.path().join("good2"), b"identical").unwrap();
    fs::write(dir.path().join("bad1"), b"identical").unwrap();
    fs::write(dir.path().join("bad2"), b"identical").unwrap();

    let finder = DuplicateFinder::with_digest(
        FinderConfig::default().with_min_size(0).with_workers(3),
        Arc::new(FlakyDigest(Hasher::new())),
    );
    let outcome = finder.find_duplicates(dir.path()).unwrap();

    assert!(outcome.is_complete());
    let dup_names: Vec<_> = outcome
        .duplicates
        .iter()
        .map(|e| e.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(dup_names, vec!["good1", "good2"]);

    // Failed entries never match each other, even with equal size and content
    assert_eq!(outcome.failures.len(), 2);
    assert!(outcome.failures[0].path.ends_with("bad1"));
    assert!(outcome.failures[1].path.ends_with("bad2"));
    assert!(outcome
        .failures
        .iter()
        .all(|e| e.hash.is_none() && matches!(e.error, Some(HashError::Io { .. }))));
    assert_eq!(outcome.summary.failed_files, 2);
    assert_eq!(outcome.summary.hashed_files, 2);
}

#[test]
fn test_missing_root_is_reported() {
    let result = DuplicateFinder::with_defaults().find_duplicates(Path::new("/no/such/root/dupdup"));
    assert!(matches!(result, Err(FinderError::PathNotFound(_))));
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_a_per_file_error() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("open1"), b"same bytes").unwrap();
    fs::write(dir.path().join("open2"), b"same bytes").unwrap();
    let locked = dir.path().join("locked");
    fs::write(&locked, b"same bytes").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Privileged users can read it anyway
    if fs::read(&locked).is_ok() {
        return;
    }

    let outcome = DuplicateFinder::new(FinderConfig::default().with_min_size(0))
        .find_duplicates(dir.path())
        .unwrap();

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(outcome.duplicates.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert!(matches!(
        outcome.failures[0].error,
        Some(HashError::PermissionDenied(_))
    ));
}

#[test]
fn test_traversal_error_aborts_walk_but_keeps_results() {
    let dir = tempdir().unwrap();
    let doomed = tree_with_doomed_dir(dir.path());

    let finder = DuplicateFinder::with_digest(
        FinderConfig::default()
            .with_min_size(0)
            .with_workers(1)
            .with_queue_depth(1),
        Arc::new(VanishingDirDigest::new(doomed)),
    );
    let outcome = finder.find_duplicates(dir.path()).unwrap();

    assert!(!outcome.is_complete());
    match &outcome.walk_error {
        Some(ScanError::NotFound(path)) => assert!(path.ends_with("z_gone")),
        other => panic!("expected NotFound for z_gone, got {other:?}"),
    }
    // Everything forwarded before the failure is still grouped
    assert_eq!(outcome.duplicates.len(), 4);
    assert_eq!(outcome.groups().count(), 1);
    assert!(outcome.failures.is_empty());
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_aborts_walk_but_keeps_results() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    // Sorted traversal visits these before the locked directory
    fs::write(dir.path().join("a_first"), b"walked early").unwrap();
    fs::write(dir.path().join("a_second"), b"walked early").unwrap();
    let locked = dir.path().join("z_locked");
    fs::create_dir(&locked).unwrap();
    fs::write(locked.join("inner"), b"never seen").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        eprintln!("skipping: permission bits are not enforced for this user");
        return;
    }

    let result = DuplicateFinder::new(FinderConfig::default().with_min_size(0))
        .find_duplicates(dir.path());

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let outcome = result.unwrap();
    assert!(!outcome.is_complete());
    assert!(matches!(
        outcome.walk_error,
        Some(ScanError::PermissionDenied(_))
    ));
    assert_eq!(outcome.duplicates.len(), 2);
}
