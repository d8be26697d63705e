//! Run orchestration.
//!
//! # Overview
//!
//! [`Engine::run`] executes one deduplication pass over a directory tree,
//! strictly in this order:
//!
//! 1. **Listing**: enumerate regular files ([`Walker`])
//! 2. **Hashing**: digest every file on the worker pool and wait for all
//!    of them
//! 3. **Grouping**: partition successes by digest, then optionally confirm
//!    each set byte-by-byte
//! 4. **Deletion**: keep each set's representative, remove the rest
//!
//! Per-file problems in any phase are recorded in the [`RunReport`] and
//! never abort the run. Only an invalid invocation is an error.
//!
//! # Example
//!
//! ```no_run
//! use dupesweep::engine::{Engine, EngineConfig};
//! use std::path::Path;
//!
//! let engine = Engine::new(EngineConfig::default().with_workers(4)).unwrap();
//! let report = engine.run(Path::new("/data/photos")).unwrap();
//! println!("Removed {} files", report.summary.files_deleted);
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::actions::{delete_duplicates, BatchDeleteResult, DeleteProgressCallback};
use crate::duplicates::{group_by_digest, verify_sets_with_chunk_size, DuplicateSet};
use crate::pool::{build_pool, PoolBackend, PoolError, WorkerPool};
use crate::progress::{ProgressCallback, PHASE_DELETING, PHASE_HASHING, PHASE_LISTING};
use crate::report::{
    DeletedFile, FailurePhase, FailureRecord, HashedFile, PhaseTimings, RunReport, RunSummary,
    SetReport,
};
use crate::scanner::{
    digest_to_hex, Digest, DigestAlgorithm, Hasher, Walker, WalkerConfig, DEFAULT_CHUNK_SIZE,
    MAX_CHUNK_SIZE,
};

/// Invalid invocation; the only condition that stops a run.
#[derive(thiserror::Error, Debug)]
pub enum InvocationError {
    /// The root does not exist.
    #[error("Path not found: {0}")]
    RootNotFound(PathBuf),

    /// The root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The root exists but cannot be inspected.
    #[error("Cannot access {path}: {source}")]
    RootInaccessible {
        /// Root path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Worker degree below 1.
    #[error("invalid worker count {0}: must be at least 1")]
    InvalidWorkerCount(usize),

    /// Chunk size outside `1..=MAX_CHUNK_SIZE`.
    #[error("invalid chunk size {0}: must be between 1 byte and 64 MiB")]
    InvalidChunkSize(usize),

    /// The worker pool could not be constructed.
    #[error(transparent)]
    Pool(PoolError),
}

impl From<PoolError> for InvocationError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::InvalidWorkerCount(n) => Self::InvalidWorkerCount(n),
            other => Self::Pool(other),
        }
    }
}

/// Default worker degree: the machine's available parallelism.
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

/// Configuration for one engine.
#[derive(Clone)]
pub struct EngineConfig {
    /// Maximum concurrent hash computations (W)
    pub workers: usize,
    /// Execution model for hashing
    pub backend: PoolBackend,
    /// Digest algorithm
    pub algorithm: DigestAlgorithm,
    /// Read chunk size in bytes
    pub chunk_size: usize,
    /// Confirm sets byte-by-byte before deleting
    pub verify: bool,
    /// Skip hidden files and directories
    pub skip_hidden: bool,
    /// Executable for the process backend (defaults to the running binary)
    pub worker_program: Option<PathBuf>,
    /// Optional progress callback
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("workers", &self.workers)
            .field("backend", &self.backend)
            .field("algorithm", &self.algorithm)
            .field("chunk_size", &self.chunk_size)
            .field("verify", &self.verify)
            .field("skip_hidden", &self.skip_hidden)
            .field("worker_program", &self.worker_program)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            backend: PoolBackend::default(),
            algorithm: DigestAlgorithm::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify: false,
            skip_hidden: false,
            worker_program: None,
            progress: None,
        }
    }
}

impl EngineConfig {
    /// Set the worker degree.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the pool backend.
    #[must_use]
    pub fn with_backend(mut self, backend: PoolBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Set the digest algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the read chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Enable or disable byte-by-byte verification.
    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Enable or disable skipping hidden entries.
    #[must_use]
    pub fn with_skip_hidden(mut self, skip_hidden: bool) -> Self {
        self.skip_hidden = skip_hidden;
        self
    }

    /// Set the worker executable for the process backend.
    #[must_use]
    pub fn with_worker_program(mut self, program: PathBuf) -> Self {
        self.worker_program = Some(program);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Forwards deletion events to a phase progress callback.
struct DeletionProgress<'a>(&'a dyn ProgressCallback);

impl DeleteProgressCallback for DeletionProgress<'_> {
    fn on_before_delete(&self, path: &Path, index: usize, _total: usize) {
        self.0.on_progress(index + 1, path.to_string_lossy().as_ref());
    }

    fn on_delete_success(&self, path: &Path, size: u64) {
        log::trace!("Removed {} ({} bytes)", path.display(), size);
    }

    fn on_delete_failure(&self, _path: &Path, _error: &str) {}

    fn on_complete(&self, _result: &BatchDeleteResult) {}
}

/// The deduplication engine.
pub struct Engine {
    config: EngineConfig,
    hasher: Hasher,
    pool: Box<dyn WorkerPool>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("pool", &self.pool.name())
            .finish()
    }
}

impl Engine {
    /// Validate `config` and build the worker pool.
    ///
    /// # Errors
    ///
    /// Returns an [`InvocationError`] for a zero worker count, a chunk size
    /// of zero or above [`MAX_CHUNK_SIZE`], or a pool that cannot be built.
    pub fn new(config: EngineConfig) -> Result<Self, InvocationError> {
        if config.workers == 0 {
            return Err(InvocationError::InvalidWorkerCount(config.workers));
        }
        if config.chunk_size == 0 || config.chunk_size > MAX_CHUNK_SIZE {
            return Err(InvocationError::InvalidChunkSize(config.chunk_size));
        }

        let hasher = Hasher::new()
            .with_algorithm(config.algorithm)
            .with_chunk_size(config.chunk_size);
        let pool = build_pool(config.backend, config.workers, config.worker_program.clone())?;

        Ok(Self {
            config,
            hasher,
            pool,
        })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn progress(&self) -> Option<&dyn ProgressCallback> {
        self.config.progress.as_deref()
    }

    fn check_root(root: &Path) -> Result<(), InvocationError> {
        match std::fs::metadata(root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(InvocationError::NotADirectory(root.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(InvocationError::RootNotFound(root.to_path_buf()))
            }
            Err(e) => Err(InvocationError::RootInaccessible {
                path: root.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Run every phase over `root` and report what happened.
    ///
    /// # Errors
    ///
    /// Returns an [`InvocationError`] only when `root` is missing, is not a
    /// directory, or cannot be inspected. Failures on individual files are
    /// part of the returned report.
    pub fn run(&self, root: &Path) -> Result<RunReport, InvocationError> {
        Self::check_root(root)?;

        let started = Instant::now();
        let mut timings = PhaseTimings::default();
        let mut failures = Vec::new();

        log::info!(
            "Starting scan of {} ({} backend, {} workers, {})",
            root.display(),
            self.pool.name(),
            self.pool.workers(),
            self.config.algorithm
        );

        // Listing
        let phase_start = Instant::now();
        if let Some(progress) = self.progress() {
            progress.on_phase_start(PHASE_LISTING, 0);
        }
        let walker_config = WalkerConfig::default()
            .with_skip_hidden(self.config.skip_hidden)
            .with_threads(self.config.workers);
        let enumeration = Walker::new(root, walker_config).collect_files();
        if let Some(progress) = self.progress() {
            progress.on_phase_end(PHASE_LISTING);
        }
        failures.extend(enumeration.errors.iter().map(|e| {
            FailureRecord::new(FailurePhase::Enumerate, e.path(), e.to_string())
        }));
        timings.listing = phase_start.elapsed();
        log::info!(
            "Listing complete: {} files in {:?}",
            enumeration.files.len(),
            timings.listing
        );

        // Hashing, a full barrier
        let phase_start = Instant::now();
        if let Some(progress) = self.progress() {
            progress.on_phase_start(PHASE_HASHING, enumeration.files.len());
        }
        let outcomes = self
            .pool
            .hash_all(&enumeration.files, &self.hasher, self.progress());
        if let Some(progress) = self.progress() {
            progress.on_phase_end(PHASE_HASHING);
        }

        let mut hashes: BTreeMap<PathBuf, Digest> = BTreeMap::new();
        let mut hash_failures = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(digest) => {
                    hashes.insert(outcome.path, digest);
                }
                Err(e) => hash_failures.push(FailureRecord::new(
                    FailurePhase::Hash,
                    outcome.path,
                    e.to_string(),
                )),
            }
        }
        hash_failures.sort_by(|a, b| a.path.cmp(&b.path));
        let hash_failure_count = hash_failures.len();
        failures.extend(hash_failures);
        timings.hashing = phase_start.elapsed();
        log::info!(
            "Hashing complete: {} hashed, {} failed in {:?}",
            hashes.len(),
            hash_failure_count,
            timings.hashing
        );

        // Grouping and optional verification
        let phase_start = Instant::now();
        let (mut sets, _stats) = group_by_digest(&hashes);
        if self.config.verify {
            let (verified, errors) = verify_sets_with_chunk_size(&sets, self.config.chunk_size);
            failures.extend(
                errors
                    .iter()
                    .map(|e| FailureRecord::new(FailurePhase::Verify, e.path(), e.to_string())),
            );
            sets = verified;
        }
        timings.verify = phase_start.elapsed();

        // Deletion
        let phase_start = Instant::now();
        let scheduled: usize = sets.iter().map(DuplicateSet::duplicate_count).sum();
        if let Some(progress) = self.progress() {
            progress.on_phase_start(PHASE_DELETING, scheduled);
        }
        let deletion = match self.progress() {
            Some(progress) => delete_duplicates(&sets, Some(&DeletionProgress(progress))),
            None => delete_duplicates(&sets, None),
        };
        if let Some(progress) = self.progress() {
            progress.on_phase_end(PHASE_DELETING);
        }
        failures.extend(
            deletion
                .failures
                .iter()
                .map(|e| FailureRecord::new(FailurePhase::Delete, e.path(), e.to_string())),
        );
        timings.deletion = phase_start.elapsed();
        timings.total = started.elapsed();

        let summary = RunSummary {
            files_found: enumeration.files.len(),
            files_hashed: hashes.len(),
            hash_failures: hash_failure_count,
            duplicate_sets: sets.len(),
            files_deleted: deletion.success_count(),
            bytes_freed: deletion.bytes_freed,
            failures: failures.len(),
        };

        log::info!(
            "Run complete: {} duplicate sets, {} files removed, {} failures in {:?}",
            summary.duplicate_sets,
            summary.files_deleted,
            summary.failures,
            timings.total
        );

        Ok(RunReport {
            root: root.to_path_buf(),
            backend: self.config.backend,
            workers: self.pool.workers(),
            algorithm: self.config.algorithm,
            verified: self.config.verify,
            files: hashes
                .iter()
                .map(|(path, digest)| HashedFile {
                    path: path.clone(),
                    digest: digest_to_hex(digest),
                })
                .collect(),
            sets: sets
                .iter()
                .map(|set| SetReport {
                    digest: set.digest_hex(),
                    representative: set.representative().to_path_buf(),
                    duplicates: set.to_delete().to_vec(),
                })
                .collect(),
            deleted: deletion
                .successes
                .iter()
                .map(|d| DeletedFile {
                    path: d.path.clone(),
                    size: d.size,
                })
                .collect(),
            failures,
            summary,
            timings,
        })
    }
}
