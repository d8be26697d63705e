//! dupesweep - concurrent duplicate file remover
//!
//! Scans a directory tree, digests every regular file on a bounded worker
//! pool (threads or processes), groups files by digest, keeps the first
//! path of each group and permanently deletes the rest.
//!
//! The library is laid out leaf-first:
//! - [`scanner`]: enumeration and streaming digests
//! - [`pool`]: bounded worker pools and the single-writer collector
//! - [`duplicates`]: grouping and optional byte-by-byte verification
//! - [`actions`]: deletion
//! - [`engine`]: phase orchestration
//! - [`report`]: text and JSON run reports

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod logging;
pub mod pool;
pub mod progress;
pub mod report;
pub mod scanner;

use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::cli::{Cli, Commands, HashWorkerArgs, OutputFormat, ScanArgs};
use crate::config::Config;
use crate::engine::{Engine, EngineConfig};
use crate::error::ExitCode;
use crate::progress::Progress;
use crate::scanner::Hasher;

/// Run the parsed command line.
///
/// # Errors
///
/// Returns an error for invalid invocations (bad root, worker count or
/// configuration) and for failures writing the report. Per-file failures
/// are part of the report and do not make this fail.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::HashWorker(ref args) => {
            logging::init_worker_logging();
            run_hash_worker(args)?;
            Ok(ExitCode::Success)
        }
        Commands::Scan(ref args) => {
            logging::init_logging(cli.verbose, cli.quiet, !cli.no_color);
            run_scan(args, cli.config.as_deref(), cli.quiet)
        }
    }
}

fn run_hash_worker(args: &HashWorkerArgs) -> anyhow::Result<()> {
    let hasher = Hasher::new()
        .with_algorithm(args.algorithm)
        .with_chunk_size(args.chunk_size);

    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());
    pool::process::run_worker(stdin, stdout, &hasher).context("hash worker I/O failed")?;
    Ok(())
}

fn run_scan(args: &ScanArgs, config_file: Option<&Path>, quiet: bool) -> anyhow::Result<ExitCode> {
    let config =
        Config::load(config_file, &args.overrides()).context("failed to load configuration")?;

    let mut engine_config = EngineConfig::default()
        .with_workers(config.workers)
        .with_backend(config.backend)
        .with_algorithm(config.algorithm)
        .with_chunk_size(config.chunk_size)
        .with_verify(config.verify)
        .with_skip_hidden(args.skip_hidden);
    if args.progress && !quiet {
        engine_config = engine_config.with_progress(Arc::new(Progress::new(false)));
    }

    let engine = Engine::new(engine_config)?;
    let report = engine.run(&args.path)?;

    let mut out = io::stdout().lock();
    match args.output {
        OutputFormat::Text => report.write_text(&mut out)?,
        OutputFormat::Json => report.write_json(&mut out)?,
    }
    out.flush()?;

    Ok(ExitCode::Success)
}
