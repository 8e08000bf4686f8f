//! JSON export.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "summary": { "total": 2, "passed": 1, "failed": 1, ... },
//!   "results": [
//!     { "path": "/music/a.flac", "status": "PASSED", ... }
//!   ]
//! }
//! ```

use std::io::Write;

use serde::Serialize;

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput<'a, S, R> {
    /// Run summary counts
    pub summary: &'a S,
    /// One entry per file
    pub results: &'a [R],
}

impl<'a, S: Serialize, R: Serialize> JsonOutput<'a, S, R> {
    #[must_use]
    pub fn new(summary: &'a S, results: &'a [R]) -> Self {
        Self { summary, results }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{VerifyRow, VerifySummary};

    fn rows() -> Vec<VerifyRow> {
        vec![VerifyRow {
            path: "/m/a.flac".to_string(),
            status: "MISSING".to_string(),
            stored_status: "PASSED".to_string(),
            stored_mtime: Some(100.0),
            current_mtime: None,
            last_checked: "2024-01-01T00:00:00Z".to_string(),
            detail: None,
        }]
    }

    #[test]
    fn test_json_has_summary_and_results() {
        let summary = VerifySummary {
            total: 1,
            missing: 1,
            ..VerifySummary::default()
        };
        let rows = rows();
        let json = JsonOutput::new(&summary, &rows).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["total"], 1);
        assert_eq!(value["summary"]["missing"], 1);
        assert_eq!(value["results"][0]["path"], "/m/a.flac");
        assert_eq!(value["results"][0]["status"], "MISSING");
        assert!(value["results"][0]["current_mtime"].is_null());
    }

    #[test]
    fn test_write_to_pretty() {
        let summary = VerifySummary::default();
        let rows: Vec<VerifyRow> = Vec::new();
        let mut buffer = Vec::new();
        JsonOutput::new(&summary, &rows)
            .write_to(&mut buffer, true)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains('\n'));
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\"results\": []"));
    }
}
