//! Digest-based duplicate grouping.
//!
//! # Overview
//!
//! [`group_by_digest`] partitions the path→digest mapping produced by the
//! hashing phase into [`DuplicateSet`]s. Only digests shared by two or more
//! paths form a set. Inside a set, members are sorted by path and the first
//! one is the representative that survives deletion, so the outcome never
//! depends on which worker finished first.
//!
//! # Example
//!
//! ```
//! use dupesweep::duplicates::group_by_digest;
//! use std::collections::BTreeMap;
//! use std::path::PathBuf;
//!
//! let mut hashes = BTreeMap::new();
//! hashes.insert(PathBuf::from("/c"), [1u8; 16]);
//! hashes.insert(PathBuf::from("/a"), [1u8; 16]);
//! hashes.insert(PathBuf::from("/b"), [2u8; 16]);
//!
//! let (sets, stats) = group_by_digest(&hashes);
//!
//! assert_eq!(sets.len(), 1);
//! assert_eq!(sets[0].representative(), std::path::Path::new("/a"));
//! assert_eq!(stats.duplicate_files, 2);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scanner::{digest_to_hex, Digest};

/// Files that share one content digest.
///
/// Members are kept sorted; the first is the representative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateSet {
    /// Digest shared by every member
    pub digest: Digest,
    /// Member paths in lexicographic order
    pub paths: Vec<PathBuf>,
}

impl DuplicateSet {
    /// Create a set, sorting and deduplicating `paths`.
    #[must_use]
    pub fn new(digest: Digest, mut paths: Vec<PathBuf>) -> Self {
        paths.sort();
        paths.dedup();
        Self { digest, paths }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if this set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Whether the set has anything to delete (2+ members).
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        self.paths.len() > 1
    }

    /// The member that is kept.
    ///
    /// # Panics
    ///
    /// Panics on an empty set; sets built by [`group_by_digest`] never are.
    #[must_use]
    pub fn representative(&self) -> &Path {
        &self.paths[0]
    }

    /// Members scheduled for removal (everything but the representative).
    #[must_use]
    pub fn to_delete(&self) -> &[PathBuf] {
        self.paths.get(1..).unwrap_or(&[])
    }

    /// Number of redundant copies.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }

    /// Digest as lowercase hex.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        digest_to_hex(&self.digest)
    }

    /// Check whether `path` is a member.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.binary_search_by(|p| p.as_path().cmp(path)).is_ok()
    }
}

/// Statistics from the grouping phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingStats {
    /// Number of hashed files considered
    pub total_files: usize,
    /// Number of distinct digests
    pub unique_digests: usize,
    /// Number of sets with 2+ members
    pub duplicate_sets: usize,
    /// Files that would be removed (members minus representatives)
    pub duplicate_files: usize,
}

/// Group hashed files by exact digest equality.
///
/// Singletons are dropped. Sets come back ordered by representative path,
/// making the result a pure function of the mapping's content.
#[must_use]
pub fn group_by_digest(hashes: &BTreeMap<PathBuf, Digest>) -> (Vec<DuplicateSet>, GroupingStats) {
    let mut by_digest: HashMap<Digest, Vec<PathBuf>> = HashMap::new();
    for (path, digest) in hashes {
        by_digest.entry(*digest).or_default().push(path.clone());
    }

    let mut stats = GroupingStats {
        total_files: hashes.len(),
        unique_digests: by_digest.len(),
        ..GroupingStats::default()
    };

    let mut sets: Vec<DuplicateSet> = by_digest
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(digest, paths)| DuplicateSet::new(digest, paths))
        .collect();
    sets.sort_by(|a, b| a.representative().cmp(b.representative()));

    stats.duplicate_sets = sets.len();
    stats.duplicate_files = sets.iter().map(DuplicateSet::duplicate_count).sum();

    for set in &sets {
        log::debug!(
            "Duplicate set {}: {} files, keeping {}",
            set.digest_hex(),
            set.len(),
            set.representative().display()
        );
    }
    log::info!(
        "Grouping complete: {} files, {} distinct digests, {} duplicate sets",
        stats.total_files,
        stats.unique_digests,
        stats.duplicate_sets
    );

    (sets, stats)
}
