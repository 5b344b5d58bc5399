//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Sequential directory walking using jwalk, fused with the size filter
//! - Content hashing with BLAKE3
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and size-collision filtering
//! - [`hasher`]: BLAKE3 file hashing (streaming)
//!
//! # Example
//!
//! ```no_run
//! use dupdup::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     min_size: Some(1024),
//!     ..Default::default()
//! };
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let walker = Walker::new(Path::new("."), config);
//! let stats = walker.walk(&tx);
//! drop(tx);
//!
//! for candidate in rx {
//!     println!("{}: {} bytes", candidate.path.display(), candidate.size);
//! }
//! println!("{:?}", stats);
//! ```

pub mod hasher;
pub mod walker;

use std::path::PathBuf;
use std::sync::Arc;

use crate::duplicates::ContentKey;

pub use hasher::{hash_to_hex, ContentDigest, Hash, Hasher};
pub use walker::{WalkStats, Walker};

/// One filesystem object moving through the pipeline.
///
/// `path` and `size` are filled in by the walker. `hash` is filled in by a
/// digest worker, or `error` is if the file could not be read.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path to the file, as produced by the walk (root joined with children)
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// BLAKE3 content hash, absent until computed
    pub hash: Option<Hash>,
    /// Failure recorded while hashing this file
    pub error: Option<HashError>,
}

impl FileEntry {
    /// Create an entry that has not been hashed yet.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self {
            path,
            size,
            hash: None,
            error: None,
        }
    }

    /// Identity used to group files with identical content.
    ///
    /// `None` for entries that were never hashed or whose hashing failed;
    /// those can never be matched against other entries.
    #[must_use]
    pub fn content_key(&self) -> Option<ContentKey> {
        match (&self.error, self.hash) {
            (None, Some(hash)) => Some(ContentKey::new(self.size, hash)),
            _ => None,
        }
    }

    /// Content hash as lowercase hexadecimal, if computed.
    #[must_use]
    pub fn hash_hex(&self) -> Option<String> {
        self.hash.as_ref().map(hash_to_hex)
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Minimum file size to include (in bytes).
    /// Smaller files are never considered and never read.
    pub min_size: Option<u64>,

    /// Maximum file size to include (in bytes).
    pub max_size: Option<u64>,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,
}

impl WalkerConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(min_size: Option<u64>, max_size: Option<u64>, skip_hidden: bool) -> Self {
        Self {
            min_size,
            max_size,
            skip_hidden,
        }
    }
}

/// Traversal-level errors. The first one aborts the walk.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when listing a directory or reading metadata.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// A directory or file disappeared while the tree was being walked.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Any other I/O failure during traversal.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The walk stopped because shutdown was requested.
    #[error("Walk cancelled")]
    Interrupted,
}

/// Per-file hashing errors. These never abort the pipeline.
#[derive(thiserror::Error, Debug, Clone)]
pub enum HashError {
    /// The file vanished between listing and reading.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// A read failed partway through the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Hashing stopped because shutdown was requested.
    #[error("Hashing cancelled: {0}")]
    Interrupted(PathBuf),
}

impl HashError {
    /// Classify an I/O error raised while reading `path`.
    #[must_use]
    pub fn from_io(path: PathBuf, error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::NotFound => Self::NotFound(path),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io {
                path,
                source: Arc::new(error),
            },
        }
    }
}
