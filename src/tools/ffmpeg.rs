//! Stream validation by full decode.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::command::{run_with_timeout, ToolOutput};
use super::ToolError;
use crate::store::IntegrityStatus;

/// Verdict for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub status: IntegrityStatus,
    /// Decoder output for failures, empty for passes
    pub diagnostic: String,
}

impl Validation {
    #[must_use]
    pub fn passed() -> Self {
        Self {
            status: IntegrityStatus::Passed,
            diagnostic: String::new(),
        }
    }

    #[must_use]
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            status: IntegrityStatus::Failed,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Decodes a file and reports whether the stream is intact.
pub trait StreamValidator: Send + Sync {
    /// # Errors
    ///
    /// [`ToolError`] when the validator itself cannot run. A corrupt file
    /// is an `Ok` with [`IntegrityStatus::Failed`].
    fn validate(&self, path: &Path) -> Result<Validation, ToolError>;
}

/// `ffmpeg -v error -i <path> -f null -`
#[derive(Debug, Clone)]
pub struct FfmpegValidator {
    program: String,
    timeout: Duration,
}

impl FfmpegValidator {
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-v", "error", "-i"])
            .arg(path)
            .args(["-f", "null", "-"]);
        cmd
    }
}

impl Default for FfmpegValidator {
    fn default() -> Self {
        Self::new("ffmpeg", Duration::from_secs(30))
    }
}

impl StreamValidator for FfmpegValidator {
    fn validate(&self, path: &Path) -> Result<Validation, ToolError> {
        interpret(run_with_timeout(self.command(path), self.timeout), path)
    }
}

/// Turn a decoder run into a verdict. A timeout fails the file.
fn interpret(run: Result<ToolOutput, ToolError>, path: &Path) -> Result<Validation, ToolError> {
    match run {
        Ok(output) => Ok(verdict(output.status.success(), &output.stderr)),
        Err(ToolError::TimedOut { timeout, .. }) => {
            log::warn!("Validation timed out after {:?}: {}", timeout, path.display());
            Ok(Validation::failed(format!(
                "Decoding timed out after {}s",
                timeout.as_secs()
            )))
        }
        Err(e) => Err(e),
    }
}

/// Any decoder output, or a non-zero exit, fails the file.
fn verdict(success: bool, stderr: &str) -> Validation {
    let stderr = stderr.trim();
    if success && stderr.is_empty() {
        Validation::passed()
    } else if stderr.is_empty() {
        Validation::failed("Decoder exited with an error")
    } else {
        Validation::failed(stderr)
    }
}
