//! Command-line interface definitions for dupesweep.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Global options (verbosity, color, config file) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Remove duplicates under ~/Downloads with 8 hashing threads
//! dupesweep scan ~/Downloads -j 8
//!
//! # Hash in separate processes and print a JSON report
//! dupesweep scan ~/Downloads --backend processes --output json
//!
//! # Verbose mode for debugging
//! dupesweep -v scan ~/Downloads
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::ConfigOverrides;
use crate::pool::PoolBackend;
use crate::scanner::{DigestAlgorithm, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};

/// Concurrent duplicate file remover.
///
/// dupesweep hashes every regular file under a directory, keeps the first
/// copy (by path) of each set of identical files and permanently deletes
/// the others.
#[derive(Debug, Parser)]
#[command(name = "dupesweep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Configuration file (TOML); defaults to the platform config directory
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for dupesweep.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory and delete duplicate files
    ///
    /// WARNING: duplicates are removed permanently. There is no trash and
    /// no dry run.
    Scan(ScanArgs),

    /// Serve hash requests on stdin (used by the process backend)
    #[command(name = "hash-worker", hide = true)]
    HashWorker(HashWorkerArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to deduplicate
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Number of concurrent hash workers [default: available CPUs]
    #[arg(short = 'j', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Run hash workers as threads or as separate processes [default: threads]
    #[arg(long, value_enum)]
    pub backend: Option<PoolBackend>,

    /// Content digest algorithm [default: md5]
    #[arg(long, value_enum)]
    pub algorithm: Option<DigestAlgorithm>,

    /// Read chunk size (e.g., 32KiB, 1MB) [default: 32KiB]
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub chunk_size: Option<u64>,

    /// Compare duplicates byte-by-byte before deleting
    ///
    /// Slower, but a digest collision can never cause a deletion.
    #[arg(long)]
    pub verify: bool,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Show progress bars on stderr
    #[arg(long)]
    pub progress: bool,
}

impl ScanArgs {
    /// Flags that override configuration layers.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            workers: self.workers,
            backend: self.backend,
            algorithm: self.algorithm,
            chunk_size: self
                .chunk_size
                .map(|size| usize::try_from(size).unwrap_or(usize::MAX)),
            verify: self.verify.then_some(true),
        }
    }
}

/// Arguments for the hidden worker subcommand.
#[derive(Debug, Args)]
pub struct HashWorkerArgs {
    /// Content digest algorithm
    #[arg(long, value_enum, default_value = "md5")]
    pub algorithm: DigestAlgorithm,

    /// Read chunk size in bytes
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size)]
    pub chunk_size: usize,
}

/// Output format for the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Line-oriented text
    Text,
    /// Pretty-printed JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use dupesweep::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("32KiB").unwrap(), 32_768);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    // Find where the number ends and the suffix begins
    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}

/// Parse a read chunk size, accepting `1..=MAX_CHUNK_SIZE` bytes.
///
/// # Errors
///
/// Returns an error for malformed sizes and sizes out of range.
pub fn parse_chunk_size(s: &str) -> Result<usize, String> {
    let size = parse_size(s)?;
    match usize::try_from(size) {
        Ok(size) if (1..=MAX_CHUNK_SIZE).contains(&size) => Ok(size),
        _ => Err(format!(
            "Chunk size must be between 1 and {MAX_CHUNK_SIZE} bytes, got {size}"
        )),
    }
}
