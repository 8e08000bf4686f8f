//! Lock-guarded SQLite result store.
//!
//! # Overview
//!
//! All persisted state lives in one SQLite file shared by every
//! `audiotool` process pointed at it. Access is serialized two ways:
//!
//! - An exclusive advisory lock on a separate lock file ([`lock`]) wraps
//!   every critical section: index loads, batch commits and cleanup.
//! - Inside, SQLite runs in WAL mode with a busy timeout so readers that
//!   bypass the lock still see consistent data.
//!
//! # Tables
//!
//! | Table | Row type |
//! |---|---|
//! | `integrity_results` | [`IntegrityRecord`] |
//! | `audio_metadata` | [`MetadataRecord`] |
//! | `tracked_files` | [`TrackedRecord`] |
//!
//! Schema changes are additive only. Legacy `passed_files` /
//! `failed_files` / `file_tracker` tables are imported and left in place.

pub mod database;
pub mod lock;
pub mod records;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use database::{Store, StoreCounts, StoreOptions};
pub use lock::{LockGuard, StoreLock};
pub use records::{
    timestamp_now, IntegrityRecord, IntegrityStatus, MetadataRecord, StoreRow, Table,
    TrackedRecord,
};

/// Errors from the result store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The advisory lock stayed held by someone else past the deadline.
    #[error("Store lock {path} is held by another process (waited {waited:?})")]
    Contention {
        /// Lock file
        path: PathBuf,
        /// Time spent waiting
        waited: Duration,
    },

    /// SQLite reported the database busy or locked past its busy timeout.
    #[error("Database is busy: {0}")]
    Busy(String),

    /// Any other SQLite failure.
    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),

    /// Filesystem error on the store, its lock file or its backup.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the error is lock or busy contention.
    #[must_use]
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::Contention { .. } | Self::Busy(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Self::Busy(err.to_string()),
            _ => Self::Sqlite(err),
        }
    }
}
