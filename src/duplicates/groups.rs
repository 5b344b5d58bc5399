//! Grouping, retroactive emission and ordering of duplicate candidates.
//!
//! # Overview
//!
//! Both filtering stages of the pipeline use the same rule: the first entry
//! seen for a key is held back, the second releases both, and every later
//! entry for that key is released immediately. [`HoldingMap`] implements that
//! rule once; the walker keys it by size and the [`Deduper`] keys it by
//! [`ContentKey`].
//!
//! After deduplication, [`sort_duplicates`] puts entries into report order
//! (size descending, then hash ascending) and [`duplicate_groups`] exposes
//! each contiguous run of equal keys as a [`DuplicateGroup`].
//!
//! # Example
//!
//! ```
//! use dupdup::duplicates::{HoldingMap, Release};
//!
//! let mut sizes = HoldingMap::new();
//! assert!(matches!(sizes.offer(1024u64, "a.bin"), Release::Held));
//! assert_eq!(sizes.offer(1024, "b.bin").into_iter().collect::<Vec<_>>(), ["a.bin", "b.bin"]);
//! assert_eq!(sizes.offer(1024, "c.bin").into_iter().collect::<Vec<_>>(), ["c.bin"]);
//! ```

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::hash::Hash as StdHash;

use crossbeam_channel::Receiver;
use serde::Serialize;

use crate::scanner::{hash_to_hex, FileEntry, Hash};
use crate::signal::ShutdownHandler;

/// Identity of a content-equivalence class: files match only if both the
/// size and the content hash are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey {
    /// File size in bytes
    pub size: u64,
    /// BLAKE3 content hash
    pub hash: Hash,
}

impl ContentKey {
    /// Create a new content key.
    #[must_use]
    pub fn new(size: u64, hash: Hash) -> Self {
        Self { size, hash }
    }
}

/// Entries released by a single [`HoldingMap::offer`] call, in emission order.
#[derive(Debug, PartialEq, Eq)]
pub enum Release<V> {
    /// First sighting of the key: the value is held.
    Held,
    /// Key already confirmed: the value passes straight through.
    Single(V),
    /// Second sighting: the held value, then the new one.
    Pair(V, V),
}

impl<V> IntoIterator for Release<V> {
    type Item = V;
    type IntoIter = std::iter::Flatten<std::array::IntoIter<Option<V>, 2>>;

    fn into_iter(self) -> Self::IntoIter {
        let slots = match self {
            Release::Held => [None, None],
            Release::Single(value) => [Some(value), None],
            Release::Pair(held, value) => [Some(held), Some(value)],
        };
        slots.into_iter().flatten()
    }
}

/// Hold-then-release bookkeeping keyed by `K`.
///
/// A key is in at most one of the two internal sets: `held` while exactly one
/// value has been offered, `confirmed` once a second one arrived. Held values
/// leave the map the moment they are released.
#[derive(Debug)]
pub struct HoldingMap<K, V> {
    held: HashMap<K, V>,
    confirmed: HashSet<K>,
}

impl<K: Eq + StdHash, V> HoldingMap<K, V> {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            held: HashMap::new(),
            confirmed: HashSet::new(),
        }
    }

    /// Offer a value under `key` and return whatever becomes releasable.
    pub fn offer(&mut self, key: K, value: V) -> Release<V> {
        if self.confirmed.contains(&key) {
            return Release::Single(value);
        }

        match self.held.remove(&key) {
            Some(held) => {
                self.confirmed.insert(key);
                Release::Pair(held, value)
            }
            None => {
                self.held.insert(key, value);
                Release::Held
            }
        }
    }

    /// Number of keys seen exactly once so far.
    #[must_use]
    pub fn held_len(&self) -> usize {
        self.held.len()
    }

    /// Number of keys seen at least twice so far.
    #[must_use]
    pub fn confirmed_len(&self) -> usize {
        self.confirmed.len()
    }

    /// Values that never found a partner.
    pub fn into_held(self) -> impl Iterator<Item = V> {
        self.held.into_values()
    }
}

impl<K: Eq + StdHash, V> Default for HoldingMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of the deduplication stage.
#[derive(Debug, Default)]
pub struct Deduped {
    /// Entries whose content key was seen at least twice (unsorted)
    pub duplicates: Vec<FileEntry>,
    /// Entries that could not be hashed, each a singleton failure record
    pub failures: Vec<FileEntry>,
    /// Hashed entries whose content key stayed unique
    pub unique_files: usize,
}

/// Groups hashed entries by [`ContentKey`], keeping only confirmed duplicates.
///
/// Input order does not matter: the holding map lives for the whole stage.
#[derive(Debug, Default)]
pub struct Deduper {
    pending: HoldingMap<ContentKey, FileEntry>,
    duplicates: Vec<FileEntry>,
    failures: Vec<FileEntry>,
}

impl Deduper {
    /// Create an empty deduper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one enriched entry.
    pub fn push(&mut self, entry: FileEntry) {
        match entry.content_key() {
            Some(key) => {
                let released = self.pending.offer(key, entry);
                self.duplicates.extend(released);
            }
            None => {
                match &entry.error {
                    Some(e) => log::debug!("Deduper: passing through failed entry: {}", e),
                    None => log::debug!(
                        "Deduper: passing through unhashed entry: {}",
                        entry.path.display()
                    ),
                }
                self.failures.push(entry);
            }
        }
    }

    /// Number of entries released as duplicates so far.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }

    /// Finish the stage, dropping entries that never matched.
    #[must_use]
    pub fn finish(self) -> Deduped {
        let unique_files = self.pending.held_len();
        log::debug!(
            "Deduper: {} duplicates in {} groups, {} unique, {} failed",
            self.duplicates.len(),
            self.pending.confirmed_len(),
            unique_files,
            self.failures.len()
        );
        Deduped {
            duplicates: self.duplicates,
            failures: self.failures,
            unique_files,
        }
    }
}

/// Drain the enriched stream into a [`Deduper`].
///
/// Returns when the stream closes or shutdown is requested; in the latter case
/// the result is incomplete and callers must check the flag.
#[must_use]
pub fn group_duplicates(enriched: &Receiver<FileEntry>, shutdown: &ShutdownHandler) -> Deduped {
    let mut deduper = Deduper::new();
    while let Some(entry) = shutdown.recv(enriched) {
        deduper.push(entry);
    }
    deduper.finish()
}

/// Report order: size descending, then hash bytes ascending.
///
/// Path breaks the remaining ties so repeated runs print identical output.
#[must_use]
pub fn compare_entries(a: &FileEntry, b: &FileEntry) -> Ordering {
    b.size
        .cmp(&a.size)
        .then_with(|| a.hash.cmp(&b.hash))
        .then_with(|| a.path.cmp(&b.path))
}

/// Sort duplicate entries into report order.
#[must_use]
pub fn sort_duplicates(mut entries: Vec<FileEntry>) -> Vec<FileEntry> {
    entries.sort_by(compare_entries);
    entries
}

/// A run of sorted entries sharing one [`ContentKey`].
#[derive(Debug, Clone, Copy)]
pub struct DuplicateGroup<'a> {
    /// File size in bytes (shared by all files in this group)
    pub size: u64,
    /// BLAKE3 hash shared by all files in this group
    pub hash: Hash,
    /// The group members, in report order
    pub files: &'a [FileEntry],
}

impl DuplicateGroup<'_> {
    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Bytes that could be reclaimed by keeping a single copy.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * (self.files.len() as u64).saturating_sub(1)
    }

    /// Hash as hexadecimal string.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hash_to_hex(&self.hash)
    }
}

impl Serialize for DuplicateGroup<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let paths: Vec<String> = self
            .files
            .iter()
            .map(|f| f.path.display().to_string())
            .collect();

        let mut state = serializer.serialize_struct("DuplicateGroup", 3)?;
        state.serialize_field("size", &self.size)?;
        state.serialize_field("hash", &self.hash_hex())?;
        state.serialize_field("files", &paths)?;
        state.end()
    }
}

/// Split sorted duplicates into their contiguous groups.
///
/// Entries without a content key are skipped; the deduper never releases any.
pub fn duplicate_groups(sorted: &[FileEntry]) -> impl Iterator<Item = DuplicateGroup<'_>> {
    sorted
        .chunk_by(|a, b| a.content_key() == b.content_key())
        .filter_map(|run| {
            let key = run.first()?.content_key()?;
            Some(DuplicateGroup {
                size: key.size,
                hash: key.hash,
                files: run,
            })
        })
}
