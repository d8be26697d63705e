//! Permanent removal of redundant copies.
//!
//! # Overview
//!
//! [`delete_duplicates`] walks the duplicate sets one at a time on the
//! calling thread. For each set it:
//! - confirms the representative is still a regular file, skipping the
//!   whole set otherwise so the last copy is never removed
//! - removes every other member with [`std::fs::remove_file`]
//! - records per-member failures and carries on with the next member
//!
//! **WARNING**: removal is immediate and cannot be undone. There is no trash
//! and no dry run.
//!
//! # Example
//!
//! ```no_run
//! use dupesweep::actions::delete_duplicates;
//! use dupesweep::duplicates::DuplicateSet;
//! use std::path::PathBuf;
//!
//! let set = DuplicateSet::new(
//!     [0u8; 16],
//!     vec![PathBuf::from("/data/a.txt"), PathBuf::from("/data/c.txt")],
//! );
//! let result = delete_duplicates(&[set], None);
//! println!("{}", result.summary());
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::duplicates::DuplicateSet;

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The copy that should be kept is gone, so its set was left alone.
    #[error("representative {path} is missing, kept {skipped} duplicate(s) in place")]
    RepresentativeMissing {
        /// Representative that could not be found
        path: PathBuf,
        /// Members that were not deleted because of it
        skipped: usize,
    },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::RepresentativeMissing { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }

    fn from_io(path: &Path, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: e,
            },
        }
    }
}

/// Result of a successful deletion operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    /// Path that was deleted.
    pub path: PathBuf,
    /// Size of the deleted file in bytes.
    pub size: u64,
}

impl DeleteResult {
    /// Create a new delete result.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self { path, size }
    }
}

/// Results of a batch deletion operation.
#[derive(Debug, Default)]
pub struct BatchDeleteResult {
    /// Successfully deleted files.
    pub successes: Vec<DeleteResult>,
    /// Failed deletions and skipped sets.
    pub failures: Vec<DeleteError>,
    /// Total bytes freed.
    pub bytes_freed: u64,
}

impl BatchDeleteResult {
    /// Number of successful deletions.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    /// Number of failed deletions.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Total number of attempted deletions.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Check if all deletions succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!(
                "Deleted {} file(s), freed {} bytes",
                self.success_count(),
                self.bytes_freed
            )
        } else {
            format!(
                "Deleted {} file(s), {} failed, freed {} bytes",
                self.success_count(),
                self.failure_count(),
                self.bytes_freed
            )
        }
    }
}

/// Callback trait for deletion progress reporting.
pub trait DeleteProgressCallback: Send + Sync {
    /// Called before each file deletion.
    fn on_before_delete(&self, path: &Path, index: usize, total: usize);

    /// Called after successful deletion.
    fn on_delete_success(&self, path: &Path, size: u64);

    /// Called after failed deletion.
    fn on_delete_failure(&self, path: &Path, error: &str);

    /// Called when batch operation completes.
    fn on_complete(&self, result: &BatchDeleteResult);
}

/// Permanently delete a single file.
///
/// **WARNING**: This operation cannot be undone.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if deletion is not allowed
/// - `Io` for anything else, including a directory sitting at `path`
pub fn permanent_delete(path: &Path) -> Result<DeleteResult, DeleteError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| DeleteError::from_io(path, e))?;
    let size = metadata.len();

    fs::remove_file(path).map_err(|e| {
        log::error!("Permanent delete failed for {}: {}", path.display(), e);
        DeleteError::from_io(path, e)
    })?;

    log::debug!("Deleted {} ({} bytes)", path.display(), size);
    Ok(DeleteResult::new(path.to_path_buf(), size))
}

/// Check that the representative of a set is still a regular file.
///
/// # Errors
///
/// Returns `RepresentativeMissing` when it is gone or no longer a regular
/// file. An empty set has nothing to protect and passes.
pub fn validate_representative(set: &DuplicateSet) -> Result<(), DeleteError> {
    let Some(representative) = set.paths.first() else {
        return Ok(());
    };
    let present = fs::symlink_metadata(representative)
        .map(|m| m.file_type().is_file())
        .unwrap_or(false);

    if present {
        Ok(())
    } else {
        log::error!(
            "Representative {} is missing, leaving {} duplicate(s) untouched",
            representative.display(),
            set.duplicate_count()
        );
        Err(DeleteError::RepresentativeMissing {
            path: representative.to_path_buf(),
            skipped: set.duplicate_count(),
        })
    }
}

/// Remove every non-representative member of every set.
///
/// Runs on the calling thread, one file at a time. Sets with fewer than two
/// members are skipped. Failures never stop the batch.
pub fn delete_duplicates(
    sets: &[DuplicateSet],
    callback: Option<&dyn DeleteProgressCallback>,
) -> BatchDeleteResult {
    let mut result = BatchDeleteResult::default();
    let total: usize = sets.iter().map(DuplicateSet::duplicate_count).sum();
    let mut index = 0;

    for set in sets {
        if !set.is_actionable() {
            log::debug!("Skipping set {} with {} member(s)", set.digest_hex(), set.len());
            continue;
        }
        if let Err(e) = validate_representative(set) {
            index += set.duplicate_count();
            result.failures.push(e);
            continue;
        }

        for path in set.to_delete() {
            if let Some(cb) = callback {
                cb.on_before_delete(path, index, total);
            }
            index += 1;

            match permanent_delete(path) {
                Ok(deleted) => {
                    result.bytes_freed += deleted.size;
                    if let Some(cb) = callback {
                        cb.on_delete_success(path, deleted.size);
                    }
                    result.successes.push(deleted);
                }
                Err(e) => {
                    let error_msg = e.to_string();
                    log::warn!("Failed to delete {}: {}", path.display(), error_msg);
                    if let Some(cb) = callback {
                        cb.on_delete_failure(path, &error_msg);
                    }
                    result.failures.push(e);
                }
            }
        }
    }

    if let Some(cb) = callback {
        cb.on_complete(&result);
    }

    log::info!("{}", result.summary());
    result
}
