//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Digest-based grouping into duplicate sets
//! - Optional byte-by-byte verification of those sets

pub mod groups;
pub mod verify;

pub use groups::{group_by_digest, DuplicateSet, GroupingStats};
pub use verify::{files_equal, verify_sets, verify_sets_with_chunk_size, VerifyError};
