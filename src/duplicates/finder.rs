//! Duplicate finder: the concurrent detection pipeline.
//!
//! # Overview
//!
//! [`DuplicateFinder::find_duplicates`] runs four stages inside one thread
//! scope:
//!
//! 1. **Walk + size filter**: one thread runs the [`Walker`], which forwards
//!    only files whose size collides with another file's size.
//! 2. **Digest pool**: [`DigestPool`] workers drain the bounded candidate
//!    channel and hash each file (or attach the read error to it).
//! 3. **Dedupe**: the calling thread groups the enriched stream by
//!    `(size, hash)` and keeps confirmed duplicates.
//! 4. **Sort**: duplicates are ordered by size descending, then hash.
//!
//! The scope joins every thread before the call returns, including after a
//! shutdown request, so no stage outlives the pipeline.
//!
//! # Example
//!
//! ```no_run
//! use dupdup::duplicates::{DuplicateFinder, FinderConfig};
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::new(FinderConfig::default().with_workers(4));
//! let outcome = finder.find_duplicates(Path::new(".")).unwrap();
//!
//! for group in outcome.groups() {
//!     println!("{} files of {} bytes", group.len(), group.size);
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;

use super::groups::{duplicate_groups, group_duplicates, sort_duplicates, DuplicateGroup};
use crate::scanner::{ContentDigest, FileEntry, HashError, Hasher, ScanError, Walker, WalkerConfig};
use crate::signal::ShutdownHandler;

/// Default capacity of the bounded channels between stages.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Number of digest workers used when none is configured: one per available
/// hardware thread, or 4 if that cannot be determined.
#[must_use]
pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

/// Fixed-size pool of hashing workers.
///
/// Every worker owns a clone of the output sender, so the output channel
/// closes only after the last worker has stopped.
pub struct DigestPool {
    workers: usize,
    digest: Arc<dyn ContentDigest>,
    shutdown: ShutdownHandler,
}

impl std::fmt::Debug for DigestPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestPool")
            .field("workers", &self.workers)
            .field("digest", &"<digest>")
            .field("shutdown", &self.shutdown)
            .finish()
    }
}

impl DigestPool {
    /// Create a pool of `workers` threads (at least one).
    #[must_use]
    pub fn new(workers: usize, digest: Arc<dyn ContentDigest>, shutdown: ShutdownHandler) -> Self {
        Self {
            workers: workers.max(1),
            digest,
            shutdown,
        }
    }

    /// Number of worker threads this pool spawns.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Spawn the workers on `scope` and return the enriched stream.
    ///
    /// Entries arrive in no particular order. Each carries either a hash or
    /// an error.
    pub fn digest_all<'scope>(
        &self,
        scope: &'scope thread::Scope<'scope, '_>,
        candidates: Receiver<FileEntry>,
        queue_depth: usize,
    ) -> Receiver<FileEntry> {
        let (results_tx, results_rx) = bounded(queue_depth.max(1));

        for id in 0..self.workers {
            let candidates = candidates.clone();
            let results = results_tx.clone();
            let digest = Arc::clone(&self.digest);
            let shutdown = self.shutdown.clone();

            scope.spawn(move || digest_worker(id, &candidates, &results, digest.as_ref(), &shutdown));
        }

        results_rx
    }
}

/// Worker loop: hash candidates until the input closes or shutdown is raised.
fn digest_worker(
    id: usize,
    candidates: &Receiver<FileEntry>,
    results: &Sender<FileEntry>,
    digest: &dyn ContentDigest,
    shutdown: &ShutdownHandler,
) {
    let mut processed = 0usize;

    while let Some(mut entry) = shutdown.recv(candidates) {
        match digest.digest(&entry.path) {
            Ok(hash) => {
                log::trace!("Hash computed: {}", entry.path.display());
                entry.hash = Some(hash);
            }
            Err(HashError::Interrupted(path)) => {
                log::debug!("Worker {}: Shutdown while hashing {}", id, path.display());
                break;
            }
            Err(e) => {
                log::warn!("Failed to hash {}: {}", entry.path.display(), e);
                entry.error = Some(e);
            }
        }

        if shutdown.send(results, entry).is_err() {
            break;
        }
        processed += 1;
    }

    log::trace!("Worker {}: stopped after {} files", id, processed);
}

/// Configuration for the duplicate finder.
#[derive(Debug, Clone)]
pub struct FinderConfig {
    /// Number of digest workers.
    pub workers: usize,
    /// Capacity of the bounded channels between stages.
    pub queue_depth: usize,
    /// Walker configuration for directory traversal.
    pub walker_config: WalkerConfig,
    /// Optional shutdown handler for graceful termination.
    pub shutdown: Option<ShutdownHandler>,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            walker_config: WalkerConfig::default(),
            shutdown: None,
        }
    }
}

impl FinderConfig {
    /// Set the number of digest workers (minimum 1).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the channel capacity between stages (minimum 1).
    #[must_use]
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the minimum file size considered by the walker.
    #[must_use]
    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.walker_config.min_size = Some(min_size);
        self
    }

    /// Set the shutdown handler for graceful termination.
    #[must_use]
    pub fn with_shutdown(mut self, handler: ShutdownHandler) -> Self {
        self.shutdown = Some(handler);
        self
    }
}

/// Statistics from a completed scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Files that passed the size thresholds
    pub total_files: usize,
    /// Combined size of those files
    pub total_size: u64,
    /// Files forwarded to hashing by the size filter
    pub candidates: usize,
    /// Files skipped because no other file had the same size
    pub eliminated_by_size: usize,
    /// Files hashed successfully
    pub hashed_files: usize,
    /// Files that could not be hashed
    pub failed_files: usize,
    /// Number of duplicate groups
    pub duplicate_groups: usize,
    /// Files beyond the first in each group
    pub duplicate_files: usize,
    /// Bytes reclaimable by keeping one copy per group
    pub reclaimable_space: u64,
    /// Wall-clock duration of the scan
    #[serde(skip)]
    pub scan_duration: Duration,
}

impl ScanSummary {
    /// Reclaimable space in human-readable form.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        ByteSize(self.reclaimable_space).to_string()
    }

    /// Total scanned size in human-readable form.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        ByteSize(self.total_size).to_string()
    }
}

/// Result of a scan that was not interrupted.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Confirmed duplicates in report order; groups are contiguous runs
    pub duplicates: Vec<FileEntry>,
    /// Files whose content could not be read, sorted by path
    pub failures: Vec<FileEntry>,
    /// Scan statistics
    pub summary: ScanSummary,
    /// Traversal error that ended the walk early, if any
    pub walk_error: Option<ScanError>,
}

impl ScanOutcome {
    /// Iterate over the duplicate groups in report order.
    pub fn groups(&self) -> impl Iterator<Item = DuplicateGroup<'_>> {
        duplicate_groups(&self.duplicates)
    }

    /// Whether the whole tree was walked.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.walk_error.is_none()
    }
}

/// Errors that stop the pipeline from producing a report.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The specified path was not found.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The scan was cancelled.
    #[error("Scan interrupted")]
    Interrupted,

    /// The walk stopped on a traversal error.
    #[error("Traversal failed: {0}")]
    Scan(#[from] ScanError),
}

/// Orchestrates the walker, digest pool, deduper and sorter.
pub struct DuplicateFinder {
    config: FinderConfig,
    shutdown: ShutdownHandler,
    digest: Arc<dyn ContentDigest>,
}

impl DuplicateFinder {
    /// Create a finder hashing with BLAKE3.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let shutdown = config.shutdown.clone().unwrap_or_default();
        let hasher = Hasher::new().with_shutdown(shutdown.clone());
        Self::with_digest(config, Arc::new(hasher))
    }

    /// Create a finder with a custom content digest.
    #[must_use]
    pub fn with_digest(config: FinderConfig, digest: Arc<dyn ContentDigest>) -> Self {
        let shutdown = config.shutdown.clone().unwrap_or_default();
        Self {
            config,
            shutdown,
            digest,
        }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// Find all duplicate files under `path`.
    ///
    /// A traversal error does not discard the work already done: the outcome
    /// carries it in [`ScanOutcome::walk_error`] next to the duplicates found
    /// among the files walked before it.
    ///
    /// # Errors
    ///
    /// Returns `FinderError` if:
    /// - The path does not exist
    /// - The path is not a directory
    /// - The scan is interrupted by shutdown signal (no partial result)
    pub fn find_duplicates(&self, path: &Path) -> Result<ScanOutcome, FinderError> {
        let start_time = Instant::now();

        if !path.exists() {
            return Err(FinderError::PathNotFound(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Err(FinderError::NotADirectory(path.to_path_buf()));
        }
        if self.shutdown.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }

        log::info!(
            "Starting duplicate scan of {} ({} workers)",
            path.display(),
            self.config.workers
        );

        let walker = Walker::new(path, self.config.walker_config.clone())
            .with_shutdown(self.shutdown.clone());
        let pool = DigestPool::new(
            self.config.workers,
            Arc::clone(&self.digest),
            self.shutdown.clone(),
        );
        let queue_depth = self.config.queue_depth.max(1);

        let (walk_result, deduped) = thread::scope(|s| {
            let (candidate_tx, candidate_rx) = bounded(queue_depth);

            let walking = s.spawn(move || walker.walk(&candidate_tx));
            let enriched = pool.digest_all(s, candidate_rx, queue_depth);
            let deduped = group_duplicates(&enriched, &self.shutdown);

            let walk_result = walking.join().unwrap_or_else(|_| {
                Err(ScanError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::other("walker thread panicked"),
                })
            });
            (walk_result, deduped)
        });

        if self.shutdown.is_shutdown_requested()
            || matches!(walk_result, Err(ScanError::Interrupted))
        {
            log::info!("Scan interrupted, discarding partial results");
            return Err(FinderError::Interrupted);
        }

        let (walk_stats, walk_error) = match walk_result {
            Ok(stats) => (Some(stats), None),
            Err(e) => {
                log::warn!("Walk aborted: {}", e);
                (None, Some(e))
            }
        };

        let duplicates = sort_duplicates(deduped.duplicates);
        let mut failures = deduped.failures;
        failures.sort_by(|a, b| a.path.cmp(&b.path));

        let mut summary = ScanSummary {
            hashed_files: duplicates.len() + deduped.unique_files,
            failed_files: failures.len(),
            ..Default::default()
        };
        if let Some(stats) = walk_stats {
            summary.total_files = stats.files_seen;
            summary.total_size = stats.bytes_seen;
            summary.candidates = stats.candidates;
            summary.eliminated_by_size = stats.unique_sizes;
        }
        for group in duplicate_groups(&duplicates) {
            log::debug!(
                "Duplicate group {}: {} files, {} bytes each",
                group.hash_hex(),
                group.len(),
                group.size
            );
            summary.duplicate_groups += 1;
            summary.duplicate_files += group.len() - 1;
            summary.reclaimable_space += group.wasted_space();
        }
        summary.scan_duration = start_time.elapsed();

        log::info!(
            "Scan complete: {} files ({}), {} hashed, {} duplicate groups, {} reclaimable",
            summary.total_files,
            summary.total_size_display(),
            summary.hashed_files,
            summary.duplicate_groups,
            summary.reclaimable_display()
        );

        Ok(ScanOutcome {
            duplicates,
            failures,
            summary,
            walk_error,
        })
    }
}
