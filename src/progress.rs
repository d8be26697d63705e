//! Progress reporting utilities using indicatif.
//!
//! The engine reports through [`ProgressCallback`]; [`Progress`] renders
//! those events as terminal progress bars on stderr. During hashing the
//! callbacks are issued by the single result collector, so a slow worker
//! never waits on the terminal.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Phase name used while enumerating files.
pub const PHASE_LISTING: &str = "listing";
/// Phase name used while hashing files.
pub const PHASE_HASHING: &str = "hashing";
/// Phase name used while deleting duplicates.
pub const PHASE_DELETING: &str = "deleting";

/// Progress callback for the deduplication phases.
///
/// Implement this trait to receive progress updates during a run.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (e.g., "hashing")
    /// * `total` - Total number of items to process, 0 if unknown
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed.
    ///
    /// # Arguments
    ///
    /// * `current` - Current item number (1-based)
    /// * `path` - Path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);
}

/// Progress reporter using indicatif.
///
/// Phases run strictly one after another, so a single active bar is enough.
pub struct Progress {
    active: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bars will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupesweep::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            active: Mutex::new(None),
            quiet,
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn with_active(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.active.lock() {
            if let Some(ref pb) = *guard {
                f(pb);
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        let pb = if total == 0 {
            let pb = ProgressBar::new_spinner();
            pb.set_style(Self::spinner_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(Self::bar_style());
            pb
        };
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.set_message(phase.to_string());

        if let Ok(mut guard) = self.active.lock() {
            if let Some(previous) = guard.replace(pb) {
                previous.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        self.with_active(|pb| {
            pb.set_position(current as u64);
            pb.set_message(truncate_path(path, 30));
        });
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        if let Ok(mut guard) = self.active.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_with_message(format!("{phase} complete"));
            }
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let chars: Vec<char> = file_name.chars().collect();
    if chars.len() + 4 > max_len {
        let tail: String = chars[chars.len().saturating_sub(max_len.saturating_sub(3))..]
            .iter()
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
