//! Directory walker fused with the size-collision filter.
//!
//! # Overview
//!
//! The [`Walker`] traverses a tree with [`jwalk`] in serial mode, so a single
//! thread sees every entry in a fixed order (children sorted by name). Each
//! regular file that passes the size thresholds is offered to a size-keyed
//! [`HoldingMap`]:
//!
//! - the first file of a given size is held back,
//! - the second releases the held file, then itself,
//! - every later file of that size is forwarded immediately.
//!
//! A file whose size never repeats is therefore never forwarded, and never
//! read by the digest workers downstream.
//!
//! Symbolic links, directories and special files are skipped. The first
//! traversal error aborts the walk and becomes its terminal result; entries
//! forwarded before that point stay valid.
//!
//! # Example
//!
//! ```no_run
//! use dupdup::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let walker = Walker::new(Path::new("/home/user/Downloads"), WalkerConfig::default());
//! let result = walker.walk(&tx);
//! drop(tx);
//!
//! let candidates: Vec<_> = rx.iter().collect();
//! println!("{} candidates, walk result: {:?}", candidates.len(), result);
//! ```

use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use jwalk::{Parallelism, WalkDir};

use super::{FileEntry, ScanError, WalkerConfig};
use crate::duplicates::HoldingMap;
use crate::signal::ShutdownHandler;

/// Counters produced by a completed walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Regular files that passed the size thresholds
    pub files_seen: usize,
    /// Files forwarded downstream because their size collided
    pub candidates: usize,
    /// Sizes seen exactly once (those files were never forwarded)
    pub unique_sizes: usize,
    /// Bytes in all files that passed the size thresholds
    pub bytes_seen: u64,
}

/// Sequential directory walker producing hash candidates.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Stop signal shared with the rest of the pipeline
    shutdown: ShutdownHandler,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown: ShutdownHandler::new(),
        }
    }

    /// Share the pipeline's shutdown handler with this walker.
    ///
    /// Once the handler is raised the walk stops at the next entry, or while
    /// waiting to forward a candidate, and returns [`ScanError::Interrupted`].
    #[must_use]
    pub fn with_shutdown(mut self, handler: ShutdownHandler) -> Self {
        self.shutdown = handler;
        self
    }

    /// Check if a file passes size filters.
    fn passes_size_filter(&self, size: u64) -> bool {
        if let Some(min) = self.config.min_size {
            if size < min {
                return false;
            }
        }
        if let Some(max) = self.config.max_size {
            if size > max {
                return false;
            }
        }
        true
    }

    /// Walk the tree and forward every file whose size collides with another.
    ///
    /// Blocks while `candidates` is full. The sender is borrowed, so the
    /// caller decides when the channel closes (normally by dropping it right
    /// after this returns).
    ///
    /// # Errors
    ///
    /// Returns the first traversal error, or [`ScanError::Interrupted`] if
    /// shutdown was requested or the receiving side went away.
    pub fn walk(&self, candidates: &Sender<FileEntry>) -> Result<WalkStats, ScanError> {
        let mut sizes: HoldingMap<u64, FileEntry> = HoldingMap::new();
        let mut stats = WalkStats::default();

        let walk_dir = WalkDir::new(&self.root)
            .parallelism(Parallelism::Serial)
            .follow_links(false)
            .skip_hidden(self.config.skip_hidden)
            .sort(true);

        for entry_result in walk_dir {
            if self.shutdown.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                return Err(ScanError::Interrupted);
            }

            let mut entry = entry_result.map_err(|e| self.handle_jwalk_error(e))?;

            // jwalk reports an unreadable directory on the directory's own entry
            if let Some(error) = entry.read_children_error.take() {
                return Err(self.handle_jwalk_error(error));
            }

            let file_type = entry.file_type();

            // Directories are descended into by jwalk; links and special files are never followed
            if !file_type.is_file() {
                if file_type.is_symlink() {
                    log::trace!("Skipping symlink: {}", entry.path().display());
                }
                continue;
            }

            let path = entry.path();
            let metadata =
                std::fs::symlink_metadata(&path).map_err(|e| handle_io_error(&path, e))?;
            if !metadata.is_file() {
                continue;
            }

            let size = metadata.len();
            if !self.passes_size_filter(size) {
                log::trace!(
                    "Skipping file due to size filter ({}): {}",
                    size,
                    path.display()
                );
                continue;
            }

            stats.files_seen += 1;
            stats.bytes_seen += size;

            for candidate in sizes.offer(size, FileEntry::new(path, size)) {
                log::trace!("Size collision ({}): {}", size, candidate.path.display());
                if self.shutdown.send(candidates, candidate).is_err() {
                    log::debug!("Walker: Cancelled while forwarding a candidate");
                    return Err(ScanError::Interrupted);
                }
                stats.candidates += 1;
            }
        }

        stats.unique_sizes = sizes.held_len();
        log::debug!(
            "Walker: {} files seen, {} candidates, {} unique sizes",
            stats.files_seen,
            stats.candidates,
            stats.unique_sizes
        );
        Ok(stats)
    }

    /// Convert a jwalk error into a [`ScanError`].
    fn handle_jwalk_error(&self, error: jwalk::Error) -> ScanError {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        match error.io_error().map(std::io::Error::kind) {
            Some(kind) => handle_io_error(&path, std::io::Error::new(kind, error.to_string())),
            None => {
                log::warn!("Walker error for {}: {}", path.display(), error);
                ScanError::Io {
                    path,
                    source: std::io::Error::other(error.to_string()),
                }
            }
        }
    }
}

/// Classify an I/O error raised while listing or stat-ing `path`.
fn handle_io_error(path: &Path, error: std::io::Error) -> ScanError {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::PermissionDenied => {
            log::warn!("Permission denied: {}", path.display());
            ScanError::PermissionDenied(path.to_path_buf())
        }
        ErrorKind::NotFound => {
            log::warn!("Path not found: {}", path.display());
            ScanError::NotFound(path.to_path_buf())
        }
        _ => {
            log::warn!("I/O error for {}: {}", path.display(), error);
            ScanError::Io {
                path: path.to_path_buf(),
                source: error,
            }
        }
    }
}
