//! Run reports in text and JSON form.
//!
//! # Text layout
//!
//! ```text
//! File: /data/a.txt
//! Hash: 5d41402abc4b2a76b9719d911017c592
//! Deleted duplicate file: /data/c.txt
//! Failed to hash: /data/locked.bin: Permission denied: /data/locked.bin
//!
//! Summary:
//!   Files found:     3
//!   ...
//! ```
//!
//! # JSON schema
//!
//! ```json
//! {
//!   "root": "/data",
//!   "backend": "threads",
//!   "workers": 4,
//!   "algorithm": "md5",
//!   "verified": false,
//!   "files": [{ "path": "/data/a.txt", "digest": "5d41..." }],
//!   "sets": [{ "digest": "5d41...", "representative": "/data/a.txt", "duplicates": ["/data/c.txt"] }],
//!   "deleted": [{ "path": "/data/c.txt", "size": 5 }],
//!   "failures": [{ "phase": "hash", "path": "/data/locked.bin", "message": "..." }],
//!   "summary": { "files_found": 3, "files_hashed": 2, "duplicate_sets": 1, ... },
//!   "timings": { "listing_ms": 1, "hashing_ms": 4, "verify_ms": 0, "deletion_ms": 0, "total_ms": 6 }
//! }
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytesize::ByteSize;
use serde::{Serialize, Serializer};

use crate::pool::PoolBackend;
use crate::scanner::DigestAlgorithm;

/// Paths are shown the way `Path::display` shows them: bytes that are not
/// UTF-8 become U+FFFD, so a report can always be written.
fn lossy_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

fn lossy_paths<S: Serializer>(paths: &[PathBuf], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(paths.iter().map(|p| p.to_string_lossy()))
}

/// Phase in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePhase {
    /// Directory listing
    Enumerate,
    /// Content hashing
    Hash,
    /// Byte-by-byte verification
    Verify,
    /// Duplicate removal
    Delete,
}

impl FailurePhase {
    /// Text used in the `Failed to ...` report line.
    #[must_use]
    pub fn action(self) -> &'static str {
        match self {
            Self::Enumerate => "list",
            Self::Hash => "hash",
            Self::Verify => "verify",
            Self::Delete => "delete",
        }
    }
}

/// One failed file or subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// Phase that failed
    pub phase: FailurePhase,
    /// Path involved
    #[serde(serialize_with = "lossy_path")]
    pub path: PathBuf,
    /// Cause, as displayed
    pub message: String,
}

impl FailureRecord {
    /// Create a new failure record.
    #[must_use]
    pub fn new(phase: FailurePhase, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            phase,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A successfully hashed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashedFile {
    /// File path
    #[serde(serialize_with = "lossy_path")]
    pub path: PathBuf,
    /// Lowercase hex digest
    pub digest: String,
}

/// A duplicate set as reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetReport {
    /// Lowercase hex digest
    pub digest: String,
    /// Copy that was kept
    #[serde(serialize_with = "lossy_path")]
    pub representative: PathBuf,
    /// Copies scheduled for removal
    #[serde(serialize_with = "lossy_paths")]
    pub duplicates: Vec<PathBuf>,
}

/// A removed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedFile {
    /// Removed path
    #[serde(serialize_with = "lossy_path")]
    pub path: PathBuf,
    /// Size in bytes at removal time
    pub size: u64,
}

/// Aggregate counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Regular files enumerated
    pub files_found: usize,
    /// Files with a digest
    pub files_hashed: usize,
    /// Files whose hashing failed
    pub hash_failures: usize,
    /// Duplicate sets acted upon
    pub duplicate_sets: usize,
    /// Files removed
    pub files_deleted: usize,
    /// Bytes reclaimed
    pub bytes_freed: u64,
    /// Failures across all phases
    pub failures: usize,
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Wall-clock time spent in each phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseTimings {
    /// Enumeration
    #[serde(rename = "listing_ms", serialize_with = "as_millis")]
    pub listing: Duration,
    /// Hashing, up to the barrier
    #[serde(rename = "hashing_ms", serialize_with = "as_millis")]
    pub hashing: Duration,
    /// Grouping plus optional verification
    #[serde(rename = "verify_ms", serialize_with = "as_millis")]
    pub verify: Duration,
    /// Deletion
    #[serde(rename = "deletion_ms", serialize_with = "as_millis")]
    pub deletion: Duration,
    /// Whole run
    #[serde(rename = "total_ms", serialize_with = "as_millis")]
    pub total: Duration,
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Directory that was scanned
    #[serde(serialize_with = "lossy_path")]
    pub root: PathBuf,
    /// Worker pool backend
    pub backend: PoolBackend,
    /// Worker degree
    pub workers: usize,
    /// Digest algorithm
    pub algorithm: DigestAlgorithm,
    /// Whether sets were confirmed byte-by-byte
    pub verified: bool,
    /// Hashed files, sorted by path
    pub files: Vec<HashedFile>,
    /// Duplicate sets, ordered by representative
    pub sets: Vec<SetReport>,
    /// Removed files, in removal order
    pub deleted: Vec<DeletedFile>,
    /// Failures, grouped by phase in run order
    pub failures: Vec<FailureRecord>,
    /// Aggregate counts
    pub summary: RunSummary,
    /// Phase durations
    pub timings: PhaseTimings,
}

/// Errors that can occur while writing a report.
#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error while writing report: {0}")]
    Io(#[from] io::Error),
}

fn seconds(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}

impl RunReport {
    /// Whether any phase recorded a failure.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Failures from one phase.
    pub fn failures_in(&self, phase: FailurePhase) -> impl Iterator<Item = &FailureRecord> {
        self.failures.iter().filter(move |f| f.phase == phase)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as pretty-printed JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_json<W: Write>(&self, writer: &mut W) -> Result<(), ReportError> {
        let json = self.to_json_pretty()?;
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write the human-readable report.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), ReportError> {
        for file in &self.files {
            writeln!(writer, "File: {}", file.path.display())?;
            writeln!(writer, "Hash: {}", file.digest)?;
        }
        for deleted in &self.deleted {
            writeln!(writer, "Deleted duplicate file: {}", deleted.path.display())?;
        }
        for failure in &self.failures {
            writeln!(
                writer,
                "Failed to {}: {}: {}",
                failure.phase.action(),
                failure.path.display(),
                failure.message
            )?;
        }

        let s = &self.summary;
        writeln!(writer)?;
        writeln!(writer, "Summary:")?;
        writeln!(writer, "  Files found:     {}", s.files_found)?;
        writeln!(writer, "  Files hashed:    {}", s.files_hashed)?;
        writeln!(writer, "  Duplicate sets:  {}", s.duplicate_sets)?;
        writeln!(writer, "  Files deleted:   {}", s.files_deleted)?;
        writeln!(writer, "  Space freed:     {}", ByteSize::b(s.bytes_freed))?;
        writeln!(writer, "  Failures:        {}", s.failures)?;

        let t = &self.timings;
        writeln!(writer)?;
        writeln!(
            writer,
            "Timings ({} backend, {} workers):",
            self.backend, self.workers
        )?;
        writeln!(writer, "  Listing:   {}", seconds(t.listing))?;
        writeln!(writer, "  Hashing:   {}", seconds(t.hashing))?;
        if self.verified {
            writeln!(writer, "  Verify:    {}", seconds(t.verify))?;
        }
        writeln!(writer, "  Deletion:  {}", seconds(t.deletion))?;
        writeln!(writer, "  Total:     {}", seconds(t.total))?;
        Ok(())
    }

    /// Render the text report into a string.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_text(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
