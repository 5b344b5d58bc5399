//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! [`Hasher`] reads a file in fixed-size chunks and feeds them to BLAKE3, so
//! memory use stays flat regardless of file size. The shutdown flag is
//! checked before every chunk, which bounds how long a cancelled worker keeps
//! reading to a single chunk.
//!
//! The digest workers only see the [`ContentDigest`] trait, which lets tests
//! substitute an instrumented digest to count or slow down reads.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use super::HashError;
use crate::signal::ShutdownHandler;

/// BLAKE3 digest of a file's full content.
pub type Hash = [u8; 32];

/// Size of each read when streaming a file through the hasher.
pub const READ_BUFFER_SIZE: usize = 128 * 1024;

/// Computes a content fingerprint for a file.
pub trait ContentDigest: Send + Sync {
    /// Read the whole file at `path` and return its fingerprint.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read, or
    /// [`HashError::Interrupted`] if shutdown was requested mid-read.
    fn digest(&self, path: &Path) -> Result<Hash, HashError>;
}

/// Streaming BLAKE3 hasher.
#[derive(Debug, Clone, Default)]
pub struct Hasher {
    shutdown: Option<ShutdownHandler>,
}

impl Hasher {
    /// Create a hasher without a shutdown flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop reading between chunks once `handler` is raised.
    #[must_use]
    pub fn with_shutdown(mut self, handler: ShutdownHandler) -> Self {
        self.shutdown = Some(handler);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(ShutdownHandler::is_shutdown_requested)
    }

    /// Hash the entire content of the file at `path`.
    ///
    /// # Errors
    ///
    /// See [`ContentDigest::digest`].
    pub fn full_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path.to_path_buf(), e))?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }

            let count = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(count) => count,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path.to_path_buf(), e)),
            };

            hasher.update(&buffer[..count]);
        }

        Ok(*hasher.finalize().as_bytes())
    }
}

impl ContentDigest for Hasher {
    fn digest(&self, path: &Path) -> Result<Hash, HashError> {
        self.full_hash(path)
    }
}

/// Render a hash as 64 lowercase hexadecimal characters.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    blake3::Hash::from(*hash).to_hex().to_string()
}
