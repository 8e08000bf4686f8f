//! Exit codes and structured error output.

use serde::Serialize;

/// Process exit codes.
///
/// - 0: the run completed (per-file failures do not change this)
/// - 1: the run could not proceed (missing target, bad config, store contention)
/// - 130: interrupted by Ctrl+C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Run completed.
    Success = 0,
    /// Fatal error.
    GeneralError = 1,
    /// Interrupted by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Numeric exit status.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "AT000",
            Self::GeneralError => "AT001",
            Self::Interrupted => "AT130",
        }
    }
}

/// Error document printed on stderr with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// Code prefix, e.g. `AT001`
    pub code: String,
    /// Numeric exit status
    pub exit_code: i32,
    /// Top-level message
    pub message: String,
    /// Context chain below the top-level message
    pub causes: Vec<String>,
    /// Whether the run was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Build the document from an application error.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
