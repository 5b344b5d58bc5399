use dupdup::duplicates::{compare_entries, DuplicateFinder, FinderConfig, ScanOutcome};
use dupdup::scanner::{ContentDigest, Hash, HashError, Hasher, WalkerConfig};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// BLAKE3 hasher that records every path it is asked to read.
#[derive(Default)]
struct RecordingDigest {
    inner: Hasher,
    reads: Mutex<Vec<PathBuf>>,
}

impl RecordingDigest {
    fn reads(&self) -> Vec<PathBuf> {
        self.reads.lock().unwrap().clone()
    }
}

impl ContentDigest for RecordingDigest {
    fn digest(&self, path: &Path) -> Result<Hash, HashError> {
        self.reads.lock().unwrap().push(path.to_path_buf());
        self.inner.digest(path)
    }
}

fn scan(root: &Path, config: FinderConfig) -> ScanOutcome {
    DuplicateFinder::new(config).find_duplicates(root).unwrap()
}

fn scan_recorded(root: &Path, config: FinderConfig) -> (ScanOutcome, Arc<RecordingDigest>) {
    let digest = Arc::new(RecordingDigest::default());
    let outcome = DuplicateFinder::with_digest(config, digest.clone())
        .find_duplicates(root)
        .unwrap();
    (outcome, digest)
}

fn file_names(outcome: &ScanOutcome) -> Vec<String> {
    outcome
        .duplicates
        .iter()
        .map(|e| e.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let outcome = scan(dir.path(), FinderConfig::default());

    assert!(outcome.duplicates.is_empty());
    assert!(outcome.failures.is_empty());
    assert!(outcome.is_complete());
    assert_eq!(outcome.summary.total_files, 0);
}

#[test]
fn test_scan_reports_only_matching_content() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), [b'X'; 100]).unwrap();
    fs::write(dir.path().join("b"), [b'X'; 100]).unwrap();
    fs::write(dir.path().join("c"), [b'Y'; 100]).unwrap();
    fs::write(dir.path().join("d"), [b'X'; 50]).unwrap();

    let outcome = scan(dir.path(), FinderConfig::default().with_min_size(0));

    assert_eq!(file_names(&outcome), vec!["a", "b"]);
    let groups: Vec<_> = outcome.groups().collect();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].size, 100);
    assert_eq!(groups[0].hash, *blake3::hash(&[b'X'; 100]).as_bytes());
    assert_eq!(outcome.duplicates[0].hash, outcome.duplicates[1].hash);
}

#[test]
fn test_distinct_sizes_are_never_read() {
    let dir = tempdir().unwrap();
    for i in 1..=20 {
        fs::write(dir.path().join(format!("f{i}")), vec![0u8; i]).unwrap();
    }

    let (outcome, digest) = scan_recorded(dir.path(), FinderConfig::default().with_min_size(0));

    assert!(outcome.duplicates.is_empty());
    assert!(digest.reads().is_empty());
    assert_eq!(outcome.summary.total_files, 20);
    assert_eq!(outcome.summary.eliminated_by_size, 20);
}

#[test]
fn test_unique_size_skipped_among_collisions() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("pair1"), b"aaaa").unwrap();
    fs::write(dir.path().join("pair2"), b"bbbb").unwrap();
    fs::write(dir.path().join("loner"), b"cccccc").unwrap();

    let (outcome, digest) = scan_recorded(dir.path(), FinderConfig::default().with_min_size(0));

    let reads: HashSet<PathBuf> = digest.reads().into_iter().collect();
    assert_eq!(reads.len(), 2);
    assert!(!reads.contains(&dir.path().join("loner")));
    // Equal size, different content
    assert!(outcome.duplicates.is_empty());
}

#[test]
fn test_threshold_excludes_small_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("small1"), [1u8; 10]).unwrap();
    fs::write(dir.path().join("small2"), [1u8; 10]).unwrap();
    fs::write(dir.path().join("big1"), [2u8; 64]).unwrap();
    fs::write(dir.path().join("big2"), [2u8; 64]).unwrap();

    let (outcome, digest) = scan_recorded(dir.path(), FinderConfig::default().with_min_size(11));

    assert_eq!(file_names(&outcome), vec!["big1", "big2"]);
    assert!(outcome.duplicates.iter().all(|e| e.size >= 11));
    assert!(digest.reads().iter().all(|p| !p
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("small")));
    assert_eq!(outcome.summary.total_files, 2);
}

#[test]
fn test_threshold_is_inclusive() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), [7u8; 32]).unwrap();
    fs::write(dir.path().join("b"), [7u8; 32]).unwrap();

    let outcome = scan(dir.path(), FinderConfig::default().with_min_size(32));
    assert_eq!(outcome.duplicates.len(), 2);
}

#[test]
fn test_default_threshold_ignores_small_duplicates() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"duplicate").unwrap();
    fs::write(dir.path().join("b"), b"duplicate").unwrap();

    let config = dupdup::config::Config::default();
    let outcome = scan(
        dir.path(),
        config.finder_config(dupdup::signal::ShutdownHandler::new()),
    );
    assert!(outcome.duplicates.is_empty());
    assert_eq!(outcome.summary.total_files, 0);
}

#[test]
fn test_every_group_has_two_or_more_members() {
    let dir = tempdir().unwrap();
    for (name, content) in [
        ("one", "alpha"),
        ("two", "alpha"),
        ("three", "gamma"),
        ("four", "delta"),
        ("five", "delta"),
        ("six", "delta"),
        ("seven", "omega"),
    ] {
        fs::write(dir.path().join(name), content).unwrap();
    }

    let outcome = scan(dir.path(), FinderConfig::default().with_min_size(0));

    let groups: Vec<_> = outcome.groups().collect();
    assert_eq!(groups.len(), 2);
    assert!(groups.iter().all(|g| g.len() >= 2));
    assert_eq!(outcome.summary.duplicate_files, 3);
    assert_eq!(outcome.summary.reclaimable_space, 15);
}

#[test]
fn test_output_sorted_by_size_then_hash() {
    let dir = tempdir().unwrap();
    for size in [10usize, 300, 45, 4096] {
        for variant in 0..3u8 {
            let content = vec![variant; size];
            fs::write(dir.path().join(format!("s{size}_v{variant}_1")), &content).unwrap();
            fs::write(dir.path().join(format!("s{size}_v{variant}_2")), &content).unwrap();
        }
    }

    let outcome = scan(
        dir.path(),
        FinderConfig::default().with_min_size(0).with_workers(4),
    );

    assert_eq!(outcome.duplicates.len(), 24);
    for pair in outcome.duplicates.windows(2) {
        assert!(pair[0].size >= pair[1].size);
        if pair[0].size == pair[1].size {
            assert!(pair[0].hash <= pair[1].hash);
        }
        assert_ne!(compare_entries(&pair[0], &pair[1]), Ordering::Greater);
    }
    assert_eq!(outcome.groups().count(), 12);
}

#[test]
fn test_repeated_runs_are_identical() {
    let dir = tempdir().unwrap();
    for i in 0..40 {
        let sub = dir.path().join(format!("dir{}", i % 4));
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join(format!("f{i}")), vec![(i % 5) as u8; 16 + i % 3]).unwrap();
    }

    let config = FinderConfig::default().with_min_size(0).with_workers(8);
    let first = scan(dir.path(), config.clone());
    let second = scan(dir.path(), config);

    let paths = |o: &ScanOutcome| -> Vec<PathBuf> {
        o.duplicates.iter().map(|e| e.path.clone()).collect()
    };
    assert!(!first.duplicates.is_empty());
    assert_eq!(paths(&first), paths(&second));
}

#[test]
fn test_duplicates_across_subdirectories() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("a").join("b").join("c");
    fs::create_dir_all(&nested).unwrap();
    fs::write(dir.path().join("top.bin"), b"nested content").unwrap();
    fs::write(nested.join("deep.bin"), b"nested content").unwrap();

    let outcome = scan(dir.path(), FinderConfig::default().with_min_size(0));

    let paths: Vec<&PathBuf> = outcome.duplicates.iter().map(|e| &e.path).collect();
    assert_eq!(paths.len(), 2);
    assert!(paths.contains(&&nested.join("deep.bin")));
    assert!(paths.contains(&&dir.path().join("top.bin")));
}

#[test]
fn test_max_size_and_hidden_filters() {
    let dir = tempfile::Builder::new().prefix("scan").tempdir().unwrap();
    fs::write(dir.path().join("huge1"), [0u8; 500]).unwrap();
    fs::write(dir.path().join("huge2"), [0u8; 500]).unwrap();
    fs::write(dir.path().join("small1"), [1u8; 5]).unwrap();
    fs::write(dir.path().join(".small2"), [1u8; 5]).unwrap();
    fs::write(dir.path().join("small3"), [1u8; 5]).unwrap();

    let walker_config = WalkerConfig::new(Some(0), Some(100), true);
    let outcome = scan(
        dir.path(),
        FinderConfig::default().with_walker_config(walker_config),
    );

    assert_eq!(file_names(&outcome), vec!["small1", "small3"]);
}

#[test]
fn test_hidden_files_included_by_default() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(".hidden"), b"payload").unwrap();
    fs::write(dir.path().join("visible"), b"payload").unwrap();

    let outcome = scan(dir.path(), FinderConfig::default().with_min_size(0));
    assert_eq!(outcome.duplicates.len(), 2);
}

#[test]
fn test_single_worker_and_queue_depth_one() {
    let dir = tempdir().unwrap();
    for i in 0..30 {
        fs::write(dir.path().join(format!("f{i:02}")), [(i % 3) as u8; 8]).unwrap();
    }

    let outcome = scan(
        dir.path(),
        FinderConfig::default()
            .with_min_size(0)
            .with_workers(1)
            .with_queue_depth(1),
    );

    assert_eq!(outcome.duplicates.len(), 30);
    assert_eq!(outcome.groups().count(), 3);
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_not_followed_or_reported() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target.bin");
    fs::write(&target, b"linked content").unwrap();
    std::os::unix::fs::symlink(&target, dir.path().join("link.bin")).unwrap();

    let (outcome, digest) = scan_recorded(dir.path(), FinderConfig::default().with_min_size(0));

    assert!(outcome.duplicates.is_empty());
    assert!(digest.reads().is_empty());
    assert_eq!(outcome.summary.total_files, 1);
}
