//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - The concurrent pipeline (walk, digest pool, dedupe, sort)
//! - Hold-then-release grouping shared by the size and content stages
//! - Report ordering and duplicate group views

pub mod finder;
pub mod groups;

pub use finder::{
    default_workers, DigestPool, DuplicateFinder, FinderConfig, FinderError, ScanOutcome,
    ScanSummary, DEFAULT_QUEUE_DEPTH,
};
pub use groups::{
    compare_entries, duplicate_groups, group_duplicates, sort_duplicates, ContentKey, Deduped,
    Deduper, DuplicateGroup, HoldingMap, Release,
};
