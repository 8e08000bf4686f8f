//! CSV export: one row per file.
//!
//! Columns follow the field order of the row type ([`IntegrityRow`],
//! [`MetadataRow`] or [`VerifyRow`]). Empty cells stand for unknown values.
//!
//! [`IntegrityRow`]: super::IntegrityRow
//! [`MetadataRow`]: super::MetadataRow
//! [`VerifyRow`]: super::VerifyRow

use std::io;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// CSV output formatter.
pub struct CsvOutput<'a, R> {
    rows: &'a [R],
}

impl<'a, R: Serialize> CsvOutput<'a, R> {
    #[must_use]
    pub fn new(rows: &'a [R]) -> Self {
        Self { rows }
    }

    /// Write a header and every row.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for row in self.rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
