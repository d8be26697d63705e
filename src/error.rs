//! Structured error handling and exit codes.

use serde::Serialize;

use crate::config::ConfigError;
use crate::engine::InvocationError;

/// Exit codes for the dupesweep binary.
///
/// - 0: the run completed, even if some files failed along the way
/// - 1: unexpected failure (writing the report, spawning, ...)
/// - 2: invalid invocation: bad root, worker count, or configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// The run completed.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// The invocation was rejected before any phase ran.
    InvocationError = 2,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DS000",
            Self::GeneralError => "DS001",
            Self::InvocationError => "DS002",
        }
    }

    /// Exit code for an error that escaped `run_app`.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        let invocation = err.chain().any(|cause| {
            cause.downcast_ref::<InvocationError>().is_some()
                || cause.downcast_ref::<ConfigError>().is_some()
        });
        if invocation {
            Self::InvocationError
        } else {
            Self::GeneralError
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DS002")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
        }
    }
}
