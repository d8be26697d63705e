//! Logging setup for the scanner and its hash workers.
//!
//! Both kinds of process log through the `log` facade into `env_logger` on
//! stderr. Worker children inherit the parent's stderr, so their lines carry
//! a `[worker <pid>]` tag.
//!
//! Levels, highest priority first:
//!
//! 1. `RUST_LOG`, when set
//! 2. `-q` (error) or `-v`/`-vv` (debug/trace) for the scanner; warn for workers
//! 3. info
//!
//! Debug builds of the scanner prefix each line with a timestamp, and with
//! the module path once `-v` is given.
//!
//! ```rust,no_run
//! use dupesweep::logging::init_logging;
//!
//! init_logging(1, false, true);
//! log::debug!("visible with -v");
//! ```

use std::env;
use std::fmt::Write as _;
use std::io::Write;

use env_logger::{Builder, WriteStyle};
use log::LevelFilter;

/// Which process a log line comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRole {
    /// The scanning process
    Scanner,
    /// A `hash-worker` child
    Worker {
        /// Process id of the child
        pid: u32,
    },
}

/// Line layout shared by the scanner and worker loggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineLayout {
    role: LogRole,
    timestamps: bool,
    module_path: bool,
}

impl LineLayout {
    fn scanner(verbose: u8) -> Self {
        Self {
            role: LogRole::Scanner,
            timestamps: cfg!(debug_assertions),
            module_path: cfg!(debug_assertions) && verbose >= 1,
        }
    }

    fn worker(pid: u32) -> Self {
        Self {
            role: LogRole::Worker { pid },
            timestamps: false,
            module_path: false,
        }
    }

    /// Text between the level and the message.
    fn tag(&self, module: Option<&str>) -> String {
        let mut tag = String::new();
        if let LogRole::Worker { pid } = self.role {
            let _ = write!(tag, "[worker {pid}] ");
        }
        if self.module_path {
            let _ = write!(tag, "[{}] ", module.unwrap_or("unknown"));
        }
        tag
    }

    fn install(self, builder: &mut Builder) {
        builder.format(move |buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            if self.timestamps {
                let timestamp = buf.timestamp_seconds();
                write!(buf, "{timestamp} ")?;
            }
            writeln!(
                buf,
                "{style}{level:<5}{style:#} {}{}",
                self.tag(record.module_path()),
                record.args()
            )
        });
    }
}

/// Level selected by the scanner's command-line flags.
fn scanner_level(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

/// Builder honoring `RUST_LOG`, falling back to `level`.
fn builder(level: LevelFilter, color: bool) -> Builder {
    let mut builder = Builder::new();
    if env::var_os("RUST_LOG").is_some() {
        builder.parse_default_env();
    } else {
        builder.filter_level(level);
    }
    if !color {
        builder.write_style(WriteStyle::Never);
    }
    builder
}

/// Initialize logging for a scan.
///
/// * `verbose` - `-v` count (0 info, 1 debug, 2+ trace)
/// * `quiet` - errors only
/// * `color` - if false, never emit ANSI styles
///
/// Calls after the first one are ignored.
pub fn init_logging(verbose: u8, quiet: bool, color: bool) {
    let level = scanner_level(verbose, quiet);
    let mut builder = builder(level, color);
    LineLayout::scanner(verbose).install(&mut builder);

    if builder.try_init().is_ok() {
        log::debug!("Logging initialized at level {:?}", log::max_level());
    }
}

/// Initialize logging inside a hash worker process.
///
/// Only warnings and errors are printed unless `RUST_LOG` says otherwise.
/// Styles are off since the parent owns the terminal.
pub fn init_worker_logging() {
    let mut builder = builder(LevelFilter::Warn, false);
    LineLayout::worker(std::process::id()).install(&mut builder);
    let _ = builder.try_init();
}
