//! Reporting: console summaries and CSV/JSON exports.
//!
//! - [`report`]: summary counts and flat per-file rows
//! - [`console`]: colored summaries on stdout
//! - [`csv`] / [`json`]: export formatters
//!
//! Exports land in `<output_dir>/<kind>_export_<YYYY-MM-DD_HH-MM-SS>.<ext>`.

pub mod console;
pub mod csv;
pub mod json;
pub mod report;

use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub use self::csv::{CsvOutput, CsvOutputError};
pub use self::json::{JsonOutput, JsonOutputError};
pub use report::{
    AnalysisRow, AnalysisSummary, CheckSummary, IntegrityRow, MetadataRow, MetadataSummary,
    VerifyRow, VerifySummary,
};

/// Export file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// JSON document with summary and results
    #[default]
    Json,
    /// One CSV row per file
    Csv,
}

impl ExportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Errors writing an export file.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("Cannot create export file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] CsvOutputError),

    #[error(transparent)]
    Json(#[from] JsonOutputError),
}

/// `<dir>/<kind>_export_<YYYY-MM-DD_HH-MM-SS>.<ext>`
#[must_use]
pub fn export_path(dir: &Path, kind: &str, format: ExportFormat, at: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "{}_export_{}.{}",
        kind,
        at.format("%Y-%m-%d_%H-%M-%S"),
        format.extension()
    ))
}

/// Write `rows` (and, for JSON, `summary`) to a new timestamped file.
///
/// Creates `dir` if needed and returns the path written.
///
/// # Errors
///
/// [`ExportError`] if the file cannot be created or serialization fails.
pub fn write_export<S: Serialize, R: Serialize>(
    dir: &Path,
    kind: &str,
    format: ExportFormat,
    summary: &S,
    rows: &[R],
) -> Result<PathBuf, ExportError> {
    let path = export_path(dir, kind, format, Local::now());
    let io_err = |source| ExportError::Io {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(dir).map_err(io_err)?;
    let file = File::create(&path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    match format {
        ExportFormat::Csv => CsvOutput::new(rows).write_to(&mut writer)?,
        ExportFormat::Json => JsonOutput::new(summary, rows).write_to(&mut writer, true)?,
    }
    std::io::Write::flush(&mut writer).map_err(io_err)?;

    log::info!("Exported {} {} rows to {}", rows.len(), kind, path.display());
    Ok(path)
}
