//! JSON report for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "groups": [
//!     { "size": 1024, "hash": "abc123...", "files": ["/a.bin", "/b.bin"] }
//!   ],
//!   "errors": [
//!     { "path": "/locked.bin", "message": "Permission denied: /locked.bin" }
//!   ],
//!   "summary": {
//!     "total_files": 100,
//!     "duplicate_groups": 1,
//!     "reclaimable_space": 1024,
//!     "scan_duration_ms": 12,
//!     "complete": true,
//!     "exit_code": 0
//!   }
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::duplicates::{DuplicateGroup, ScanOutcome, ScanSummary};
use crate::error::ExitCode;
use crate::scanner::FileEntry;

/// A file that could not be hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonError {
    /// Path of the unreadable file
    pub path: String,
    /// Human-readable failure
    pub message: String,
}

impl JsonError {
    /// Build the record for a failed entry.
    #[must_use]
    pub fn from_entry(entry: &FileEntry) -> Self {
        Self {
            path: entry.path.display().to_string(),
            message: entry
                .error
                .as_ref()
                .map_or_else(|| "not hashed".to_string(), ToString::to_string),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Scan statistics
    #[serde(flatten)]
    pub stats: ScanSummary,
    /// Duration of the scan in milliseconds
    pub scan_duration_ms: u64,
    /// Whether the whole tree was walked
    pub complete: bool,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DD000")
    pub exit_code_name: String,
}

/// Complete JSON document.
#[derive(Debug, Serialize)]
pub struct JsonOutput<'a> {
    /// Duplicate groups in report order
    pub groups: Vec<DuplicateGroup<'a>>,
    /// Files that could not be hashed
    pub errors: Vec<JsonError>,
    /// Scan summary statistics
    pub summary: JsonSummary,
}

impl<'a> JsonOutput<'a> {
    /// Build the document from a finished scan.
    #[must_use]
    pub fn new(outcome: &'a ScanOutcome, exit_code: ExitCode) -> Self {
        let stats = outcome.summary.clone();
        Self {
            groups: outcome.groups().collect(),
            errors: outcome.failures.iter().map(JsonError::from_entry).collect(),
            summary: JsonSummary {
                scan_duration_ms: u64::try_from(stats.scan_duration.as_millis())
                    .unwrap_or(u64::MAX),
                stats,
                complete: outcome.is_complete(),
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
        }
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the pretty-printed document followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), JsonOutputError> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
