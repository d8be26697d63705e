//! Bounded worker pools for the hashing phase.
//!
//! # Overview
//!
//! A [`WorkerPool`] runs [`Hasher::hash_file`] over every enumerated path
//! with at most `W` hashes in flight, and returns one [`HashOutcome`] per
//! path once all of them have resolved. Two backends share that contract:
//!
//! - [`threads::ThreadPool`]: shared memory, a dedicated rayon pool of `W`
//!   threads
//! - [`process::ProcessPool`]: isolated memory, `W` child processes running
//!   the hidden `hash-worker` subcommand
//!
//! Workers never touch shared state. Each finished unit of work sends its
//! outcome over a channel to one [`ResultCollector`], owned by the thread
//! that called [`WorkerPool::hash_all`]. The call returns only after every
//! sender is gone, which is the barrier before grouping.
//!
//! # Example
//!
//! ```no_run
//! use dupesweep::pool::{build_pool, PoolBackend};
//! use dupesweep::scanner::Hasher;
//! use std::path::PathBuf;
//!
//! let pool = build_pool(PoolBackend::Threads, 4, None).unwrap();
//! let paths = vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")];
//! for outcome in pool.hash_all(&paths, &Hasher::new(), None) {
//!     println!("{}: {}", outcome.path.display(), outcome.is_ok());
//! }
//! ```

pub mod process;
pub mod threads;
pub mod wire;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use serde::{Deserialize, Serialize};

use crate::progress::ProgressCallback;
use crate::scanner::{Digest, HashError, Hasher};

pub use process::ProcessPool;
pub use threads::ThreadPool;

/// Result of hashing one enumerated path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashOutcome {
    /// Path that was hashed
    pub path: PathBuf,
    /// Digest on success, the failure otherwise
    pub result: Result<Digest, HashError>,
}

impl HashOutcome {
    /// Successful outcome.
    #[must_use]
    pub fn success(path: PathBuf, digest: Digest) -> Self {
        Self {
            path,
            result: Ok(digest),
        }
    }

    /// Failed outcome.
    #[must_use]
    pub fn failure(path: PathBuf, error: HashError) -> Self {
        Self {
            path,
            result: Err(error),
        }
    }

    /// Whether hashing succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Which execution model hashes the files.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PoolBackend {
    /// Threads inside this process
    #[default]
    Threads,
    /// Separate worker processes
    Processes,
}

impl std::fmt::Display for PoolBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Threads => write!(f, "threads"),
            Self::Processes => write!(f, "processes"),
        }
    }
}

/// Errors raised while constructing a pool.
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    /// Worker degree must be a positive integer.
    #[error("invalid worker count {0}: must be at least 1")]
    InvalidWorkerCount(usize),

    /// The rayon pool could not be built.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),

    /// The executable for worker processes could not be located.
    #[error("cannot locate worker executable: {0}")]
    WorkerProgram(#[source] std::io::Error),
}

/// A bounded pool that hashes a batch of paths.
///
/// Implementations must return exactly one outcome per distinct input path
/// and must not return before every unit of work has resolved.
pub trait WorkerPool: Send + Sync {
    /// Short backend name for logs and reports.
    fn name(&self) -> &'static str;

    /// Maximum number of concurrent hash computations.
    fn workers(&self) -> usize;

    /// Hash every path and wait for all of them.
    fn hash_all(
        &self,
        paths: &[PathBuf],
        hasher: &Hasher,
        progress: Option<&dyn ProgressCallback>,
    ) -> Vec<HashOutcome>;
}

/// Build the pool for `backend` with degree `workers`.
///
/// `worker_program` overrides the executable spawned by the process
/// backend; by default it is the running binary.
///
/// # Errors
///
/// Returns [`PoolError::InvalidWorkerCount`] for `workers == 0`, or a
/// backend-specific construction error.
pub fn build_pool(
    backend: PoolBackend,
    workers: usize,
    worker_program: Option<PathBuf>,
) -> Result<Box<dyn WorkerPool>, PoolError> {
    if workers == 0 {
        return Err(PoolError::InvalidWorkerCount(workers));
    }

    let pool: Box<dyn WorkerPool> = match backend {
        PoolBackend::Threads => Box::new(ThreadPool::new(workers)?),
        PoolBackend::Processes => {
            let program = match worker_program {
                Some(program) => program,
                None => std::env::current_exe().map_err(PoolError::WorkerProgram)?,
            };
            Box::new(ProcessPool::new(workers, program))
        }
    };

    log::debug!("Built {} pool with {} workers", pool.name(), pool.workers());
    Ok(pool)
}

/// Single-writer aggregator for hash outcomes.
///
/// Knows which paths were dispatched, accepts exactly one outcome for each
/// of them, and on [`ResultCollector::finish`] fills in a failure for any
/// path that never reported.
pub struct ResultCollector<'a> {
    pending: HashSet<PathBuf>,
    outcomes: Vec<HashOutcome>,
    progress: Option<&'a dyn ProgressCallback>,
    rejected: usize,
}

impl<'a> ResultCollector<'a> {
    /// Collector expecting one outcome for each of `paths`.
    #[must_use]
    pub fn new(paths: &[PathBuf], progress: Option<&'a dyn ProgressCallback>) -> Self {
        Self {
            pending: paths.iter().cloned().collect(),
            outcomes: Vec::with_capacity(paths.len()),
            progress,
            rejected: 0,
        }
    }

    /// Commit one outcome.
    ///
    /// Returns `false` (and drops the outcome) when the path was never
    /// dispatched or already has an outcome.
    pub fn submit(&mut self, outcome: HashOutcome) -> bool {
        if !self.pending.remove(&outcome.path) {
            log::warn!(
                "Ignoring unexpected or repeated outcome for {}",
                outcome.path.display()
            );
            self.rejected += 1;
            return false;
        }

        if let Err(ref e) = outcome.result {
            log::warn!("Failed to hash {}: {}", outcome.path.display(), e);
        }
        if let Some(progress) = self.progress {
            progress.on_progress(
                self.outcomes.len() + 1,
                outcome.path.to_string_lossy().as_ref(),
            );
        }
        self.outcomes.push(outcome);
        true
    }

    /// Commit everything arriving on `rx` until all senders are dropped.
    pub fn drain(&mut self, rx: &Receiver<HashOutcome>) {
        while let Ok(outcome) = rx.recv() {
            self.submit(outcome);
        }
    }

    /// Number of dispatched paths still without an outcome.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Number of outcomes refused by [`ResultCollector::submit`].
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Close the collector and return all outcomes in arrival order.
    #[must_use]
    pub fn finish(mut self) -> Vec<HashOutcome> {
        if !self.pending.is_empty() {
            let mut missing: Vec<PathBuf> = self.pending.drain().collect();
            missing.sort();
            for path in missing {
                log::warn!("No outcome reported for {}", path.display());
                let error = HashError::worker_lost(&path, "no outcome was reported");
                self.outcomes.push(HashOutcome::failure(path, error));
            }
        }
        self.outcomes
    }
}

/// Convenience for backends: failure outcome for a path whose worker died.
pub(crate) fn lost(path: &Path, message: impl Into<String>) -> HashOutcome {
    HashOutcome::failure(path.to_path_buf(), HashError::worker_lost(path, message))
}
