//! Isolated-memory backend: one child process per worker.
//!
//! # Protocol
//!
//! Each child is the `dupesweep` binary started with the hidden
//! [`WORKER_SUBCOMMAND`]. The parent writes one JSON [`WorkerRequest`] per
//! line to the child's stdin and closes it when the share is exhausted. The
//! child answers every request with one JSON [`WorkerResponse`] line on
//! stdout and exits at end of input. Paths travel in the byte-exact
//! [`super::wire`] encoding, so names that are not UTF-8 reach the child
//! intact.
//!
//! Paths are assigned round-robin: path `i` goes to worker `i mod W`. A
//! path whose worker crashes, cannot be spawned, or answers with garbage
//! gets a [`HashError::WorkerLost`] outcome; other workers are unaffected.

use std::collections::HashSet;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Sender};

use serde::{Deserialize, Serialize};

use super::{lost, HashOutcome, ResultCollector, WorkerPool};
use crate::progress::ProgressCallback;
use crate::scanner::{digest_to_hex, hex_to_digest, HashError, Hasher};

/// Name of the hidden subcommand that runs a hashing worker.
pub const WORKER_SUBCOMMAND: &str = "hash-worker";

/// One unit of work sent to a child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// File to hash
    #[serde(with = "super::wire")]
    pub path: PathBuf,
}

/// A child's answer for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResponse {
    /// File that was hashed
    #[serde(with = "super::wire")]
    pub path: PathBuf,
    /// Hex digest on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Failure otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<HashError>,
}

impl WorkerResponse {
    fn from_outcome(path: PathBuf, result: Result<crate::scanner::Digest, HashError>) -> Self {
        match result {
            Ok(digest) => Self {
                path,
                digest: Some(digest_to_hex(&digest)),
                error: None,
            },
            Err(error) => Self {
                path,
                digest: None,
                error: Some(error),
            },
        }
    }

    /// Convert back into an outcome, treating malformed answers as lost.
    #[must_use]
    pub fn into_outcome(self) -> HashOutcome {
        match (self.digest.as_deref().map(hex_to_digest), self.error) {
            (Some(Some(digest)), None) => HashOutcome::success(self.path, digest),
            (None, Some(error)) => HashOutcome::failure(self.path, error),
            _ => lost(&self.path, "worker sent a malformed response"),
        }
    }
}

/// Serve requests from `input` until end of stream.
///
/// This is the body of the hidden worker subcommand. Requests that cannot
/// be parsed are logged and skipped; the parent notices the missing answer.
///
/// # Errors
///
/// Returns an error if reading input or writing output fails.
pub fn run_worker<R: BufRead, W: Write>(
    input: R,
    mut output: W,
    hasher: &Hasher,
) -> io::Result<usize> {
    let mut served = 0;

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let request: WorkerRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("Worker ignoring malformed request: {}", e);
                continue;
            }
        };

        let result = hasher.hash_file(&request.path);
        let response = WorkerResponse::from_outcome(request.path, result);
        serde_json::to_writer(&mut output, &response)?;
        output.write_all(b"\n")?;
        output.flush()?;
        served += 1;
    }

    log::debug!("Worker served {} requests", served);
    Ok(served)
}

/// Hashes files in `W` child processes.
#[derive(Debug, Clone)]
pub struct ProcessPool {
    workers: usize,
    program: PathBuf,
}

impl ProcessPool {
    /// Pool of `workers` children running `program`.
    ///
    /// `program` must accept the [`WORKER_SUBCOMMAND`] command line.
    #[must_use]
    pub fn new(workers: usize, program: PathBuf) -> Self {
        Self {
            workers: workers.max(1),
            program,
        }
    }

    /// Executable spawned for each worker.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, hasher: &Hasher) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(WORKER_SUBCOMMAND)
            .arg("--algorithm")
            .arg(hasher.algorithm().as_str())
            .arg("--chunk-size")
            .arg(hasher.chunk_size().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        command
    }
}

/// Split `paths` into `workers` shares, path `i` to share `i mod workers`.
fn round_robin(paths: &[PathBuf], workers: usize) -> Vec<Vec<PathBuf>> {
    let mut shares = vec![Vec::new(); workers];
    for (i, path) in paths.iter().enumerate() {
        shares[i % workers].push(path.clone());
    }
    shares
}

/// Write every request of a share, then close the child's stdin.
fn feed(stdin: ChildStdin, share: &[PathBuf]) -> io::Result<()> {
    let mut writer = BufWriter::new(stdin);
    for path in share {
        let request = WorkerRequest { path: path.clone() };
        serde_json::to_writer(&mut writer, &request)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// Drive one child to completion, forwarding every outcome to `tx`.
fn run_child(index: usize, mut command: Command, share: Vec<PathBuf>, tx: &Sender<HashOutcome>) {
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            log::error!("Failed to spawn worker {}: {}", index, e);
            for path in &share {
                let _ = tx.send(lost(path, format!("failed to spawn worker: {e}")));
            }
            return;
        }
    };

    let mut unreported: HashSet<PathBuf> = share.iter().cloned().collect();

    match (child.stdin.take(), child.stdout.take()) {
        (Some(stdin), Some(stdout)) => {
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    if let Err(e) = feed(stdin, &share) {
                        log::debug!("Worker {} stopped accepting requests: {}", index, e);
                    }
                });

                for line in BufReader::new(stdout).lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            log::warn!("Lost output of worker {}: {}", index, e);
                            break;
                        }
                    };
                    let outcome = match serde_json::from_str::<WorkerResponse>(&line) {
                        Ok(response) => response.into_outcome(),
                        Err(e) => {
                            log::warn!("Worker {} sent unparseable output: {}", index, e);
                            continue;
                        }
                    };
                    if unreported.remove(&outcome.path) {
                        let _ = tx.send(outcome);
                    } else {
                        log::warn!(
                            "Worker {} answered for unassigned path {}",
                            index,
                            outcome.path.display()
                        );
                    }
                }
            });
        }
        _ => log::error!("Worker {} has no stdio pipes", index),
    }

    let status = match child.wait() {
        Ok(status) if status.success() => "worker exited without reporting this file".to_string(),
        Ok(status) => format!("worker exited with {status}"),
        Err(e) => format!("failed to wait for worker: {e}"),
    };
    if !unreported.is_empty() {
        log::warn!(
            "Worker {} left {} files unreported ({})",
            index,
            unreported.len(),
            status
        );
    }

    let mut missing: Vec<PathBuf> = unreported.into_iter().collect();
    missing.sort();
    for path in missing {
        let _ = tx.send(lost(&path, status.clone()));
    }
}

impl WorkerPool for ProcessPool {
    fn name(&self) -> &'static str {
        "processes"
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
        let mut collector = ResultCollector::new(paths, progress);
        let (tx, rx) = mpsc::channel::<HashOutcome>();

        std::thread::scope(|scope| {
            for (index, share) in round_robin(paths, self.workers).into_iter().enumerate() {
                if share.is_empty() {
                    continue;
                }
                let tx = tx.clone();
                let command = self.command(hasher);
                scope.spawn(move || run_child(index, command, share, &tx));
            }
            drop(tx);

            collector.drain(&rx);
        });

        collector.finish()
    }
}
