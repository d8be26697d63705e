//! Shared-memory backend: a dedicated rayon pool.
//!
//! The pool is built once with exactly `W` threads, so at most `W` files are
//! hashed at a time regardless of the global rayon configuration.

use std::path::PathBuf;
use std::sync::mpsc;

use rayon::prelude::*;

use super::{HashOutcome, PoolError, ResultCollector, WorkerPool};
use crate::progress::ProgressCallback;
use crate::scanner::Hasher;

/// Hashes files on a private rayon thread pool.
pub struct ThreadPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.workers)
            .finish()
    }
}

impl ThreadPool {
    /// Build a pool with `workers` threads.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidWorkerCount`] for zero, or
    /// [`PoolError::ThreadPool`] if the threads cannot be spawned.
    pub fn new(workers: usize) -> Result<Self, PoolError> {
        if workers == 0 {
            return Err(PoolError::InvalidWorkerCount(workers));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("dupesweep-hash-{i}"))
            .build()
            .map_err(|e| PoolError::ThreadPool(e.to_string()))?;

        Ok(Self { pool, workers })
    }
}

impl WorkerPool for ThreadPool {
    fn name(&self) -> &'static str {
        "threads"
    }

    fn workers(&self) -> usize {
        self.workers
    }

    fn hash_all(
        &self,
        paths: &[PathBuf],
        hasher: &Hasher,
        progress: Option<&dyn ProgressCallback>,
    ) -> Vec<HashOutcome> {
        let hasher = *hasher;
        let mut collector = ResultCollector::new(paths, progress);
        let (tx, rx) = mpsc::channel::<HashOutcome>();

        std::thread::scope(|scope| {
            scope.spawn(move || {
                self.pool.install(|| {
                    paths.par_iter().for_each_with(tx, |tx, path| {
                        let result = hasher.hash_file(path);
                        // Receiver only goes away if the collector panicked.
                        let _ = tx.send(HashOutcome {
                            path: path.clone(),
                            result,
                        });
                    });
                });
            });

            collector.drain(&rx);
        });

        collector.finish()
    }
}
