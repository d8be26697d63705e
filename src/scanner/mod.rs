//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Parallel directory walking using jwalk
//! - Streaming content digests (MD5 or truncated BLAKE3, 128 bits)
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and regular-file discovery
//! - [`hasher`]: Chunked file hashing
//!
//! # Example
//!
//! ```no_run
//! use dupesweep::scanner::{Hasher, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! let hasher = Hasher::new();
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) => match hasher.hash_file(&path) {
//!             Ok(digest) => println!("{}  {}", dupesweep::scanner::digest_to_hex(&digest), path.display()),
//!             Err(e) => eprintln!("Warning: {}", e),
//!         },
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// Re-export main types
pub use hasher::{
    digest_to_hex, hex_to_digest, Digest, DigestAlgorithm, Hasher, DEFAULT_CHUNK_SIZE, DIGEST_LEN,
    MAX_CHUNK_SIZE,
};
pub use walker::{Enumeration, Walker};

/// Configuration for directory walking.
///
/// Symbolic links are never followed; see [`Walker`].
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Number of threads jwalk may use to read directories.
    /// `None` lets jwalk pick its default rayon pool.
    pub threads: Option<usize>,
}

impl WalkerConfig {
    /// Skip hidden entries.
    #[must_use]
    pub fn with_skip_hidden(mut self, skip_hidden: bool) -> Self {
        self.skip_hidden = skip_hidden;
        self
    }

    /// Bound directory-reading parallelism.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads.max(1));
        self
    }
}

/// Errors that can occur during directory scanning.
///
/// None of these abort a run: the affected subtree is skipped and the
/// error is carried into the report.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when listing a directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The path vanished between discovery and inspection.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a directory entry.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::NotADirectory(p) => p,
            Self::Io { path, .. } => path,
        }
    }

    /// Classify an I/O error for `path`.
    pub(crate) fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Errors that can occur during file hashing.
///
/// Serializable so that it can be marshaled back from worker processes;
/// the underlying I/O error is therefore kept as its message, and paths use
/// the byte-exact [`crate::pool::wire`] encoding.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HashError {
    /// The file was not found (possibly deleted after enumeration).
    #[error("File not found: {path}")]
    NotFound {
        /// Path that could not be opened
        #[serde(with = "crate::pool::wire")]
        path: PathBuf,
    },

    /// Permission was denied when reading the file.
    #[error("Permission denied: {path}")]
    PermissionDenied {
        /// Path that could not be opened
        #[serde(with = "crate::pool::wire")]
        path: PathBuf,
    },

    /// An I/O error occurred while opening or reading the file.
    #[error("I/O error for {path}: {message}")]
    Io {
        /// Path where the error occurred
        #[serde(with = "crate::pool::wire")]
        path: PathBuf,
        /// The underlying I/O error message
        message: String,
    },

    /// The worker responsible for this file exited without reporting it.
    #[error("Worker lost while hashing {path}: {message}")]
    WorkerLost {
        /// Path that never got an outcome
        #[serde(with = "crate::pool::wire")]
        path: PathBuf,
        /// What happened to the worker
        message: String,
    },
}

impl HashError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path }
            | Self::PermissionDenied { path }
            | Self::Io { path, .. }
            | Self::WorkerLost { path, .. } => path,
        }
    }

    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::Io {
                path: path.to_path_buf(),
                message: error.to_string(),
            },
        }
    }

    /// A failure for a path whose worker never answered.
    #[must_use]
    pub fn worker_lost(path: &Path, message: impl Into<String>) -> Self {
        Self::WorkerLost {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}
