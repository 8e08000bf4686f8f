//! Re-verification of stored integrity rows against the filesystem.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::scanner::{stat_mtime, Hasher, StatError};
use crate::store::{IntegrityRecord, IntegrityStatus, Store, StoreError};

/// State of one stored row compared with the file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerifyStatus {
    Passed,
    Failed,
    /// File no longer exists
    Missing,
    /// File modified since it was checked
    Changed,
    /// File could not be inspected
    Error,
}

impl VerifyStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Missing => "MISSING",
            Self::Changed => "CHANGED",
            Self::Error => "ERROR",
        }
    }

    /// Everything except a clean pass counts as a problem.
    #[must_use]
    pub fn is_problem(self) -> bool {
        self != Self::Passed
    }
}

impl fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One verified row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyEntry {
    pub path: String,
    pub status: VerifyStatus,
    pub stored_status: IntegrityStatus,
    pub stored_mtime: Option<f64>,
    pub current_mtime: Option<f64>,
    pub last_checked: String,
    /// Stored diagnostic, or why the row is [`VerifyStatus::Changed`] or
    /// [`VerifyStatus::Error`]
    pub detail: Option<String>,
}

/// Compare one stored row with the file it describes.
///
/// A moved mtime alone is not a change: when the row carries a content
/// hash the file is hashed again and only a differing digest reports
/// [`VerifyStatus::Changed`]. Rows without a hash fall back to the mtime.
#[must_use]
pub fn verify_record(record: &IntegrityRecord, hasher: &Hasher) -> VerifyEntry {
    let path = Path::new(&record.path);
    let (status, current_mtime, detail) = match stat_mtime(path) {
        Err(StatError::NotFound(_)) => (VerifyStatus::Missing, None, None),
        Err(e) => (VerifyStatus::Error, None, Some(e.to_string())),
        Ok(mtime) if record.mtime == Some(mtime) => {
            (stored_outcome(record), Some(mtime), record.diagnostic.clone())
        }
        Ok(mtime) => match record.content_hash.as_deref() {
            None => (VerifyStatus::Changed, Some(mtime), record.diagnostic.clone()),
            Some(stored) => match hasher.hash_file_hex(path) {
                Ok(current) if current.eq_ignore_ascii_case(stored) => {
                    (stored_outcome(record), Some(mtime), record.diagnostic.clone())
                }
                Ok(_) => (
                    VerifyStatus::Changed,
                    Some(mtime),
                    Some("Hash mismatch".to_string()),
                ),
                Err(e) => (
                    VerifyStatus::Error,
                    Some(mtime),
                    Some(format!("Unable to read file: {e}")),
                ),
            },
        },
    };

    VerifyEntry {
        path: record.path.clone(),
        status,
        stored_status: record.status,
        stored_mtime: record.mtime,
        current_mtime,
        last_checked: record.last_checked.clone(),
        detail,
    }
}

fn stored_outcome(record: &IntegrityRecord) -> VerifyStatus {
    match record.status {
        IntegrityStatus::Passed => VerifyStatus::Passed,
        IntegrityStatus::Failed => VerifyStatus::Failed,
    }
}

/// Verify every stored integrity row, in path order.
///
/// Read-only: the store is not modified.
///
/// # Errors
///
/// [`StoreError`] on lock contention or database failure.
pub fn verify_integrity(
    store: &mut Store,
    hasher: &Hasher,
) -> Result<Vec<VerifyEntry>, StoreError> {
    let rows = store.list::<IntegrityRecord>()?;
    log::info!("Verifying {} stored integrity results", rows.len());
    Ok(rows.iter().map(|row| verify_record(row, hasher)).collect())
}
