//! Batch persistence and cleanup.
//!
//! A batch run touches the store for writing exactly once, through
//! [`BatchWriter::persist`]: one lock, an optional backup, one transaction.
//! Cleanup of rows whose files are gone is a separate locked pass.
//! [`inspect`] reports what cleanup and repair would touch without
//! writing anything.

use std::fmt;
use std::path::Path;

use crate::store::database::expected_columns;
use crate::store::{Store, StoreError, StoreRow, Table};

/// Sample rates outside `1..=MAX_SAMPLE_RATE` Hz are treated as corrupt.
pub const MAX_SAMPLE_RATE: i64 = 1_000_000;
/// Bitrates outside `1..=MAX_BITRATE` bit/s are treated as corrupt.
pub const MAX_BITRATE: i64 = 10_000_000;

/// What [`BatchWriter::repair`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub removed: usize,
    pub sample_rates_cleared: usize,
    pub bitrates_cleared: usize,
}

/// Writes batch results to the store.
#[derive(Debug)]
pub struct BatchWriter<'a> {
    store: &'a mut Store,
}

impl<'a> BatchWriter<'a> {
    #[must_use]
    pub fn new(store: &'a mut Store) -> Self {
        Self { store }
    }

    /// Upsert every row in a single critical section and transaction.
    ///
    /// With backups enabled the database is copied to `<db>.bak` first.
    /// An empty batch takes no lock and writes nothing. Returns the number
    /// of rows written.
    ///
    /// # Errors
    ///
    /// [`StoreError`] on lock contention or any SQLite failure; the
    /// transaction is rolled back and the store is left as it was.
    pub fn persist<R: StoreRow>(&mut self, rows: &[R]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            log::debug!("Nothing to persist for {}", R::TABLE);
            return Ok(0);
        }

        let backup = self
            .store
            .options()
            .backup
            .then(|| self.store.options().backup_path());

        self.store.with_lock(|conn| {
            if let Some(ref backup) = backup {
                Store::backup_into(conn, backup)?;
            }
            let tx = conn.transaction()?;
            for row in rows {
                row.upsert(&tx)?;
            }
            tx.commit()?;
            Ok(())
        })?;

        log::info!("Saved {} rows to {}", rows.len(), R::TABLE);
        Ok(rows.len())
    }

    /// Delete rows whose file no longer exists, in one locked pass.
    ///
    /// Files whose existence cannot be determined are kept.
    ///
    /// # Errors
    ///
    /// [`StoreError`] on lock contention or any SQLite failure.
    pub fn collect_garbage(&mut self, tables: &[Table]) -> Result<usize, StoreError> {
        let removed = self.store.with_lock(|conn| {
            let tx = conn.transaction()?;
            let removed = remove_missing(&tx, tables)?;
            tx.commit()?;
            Ok(removed)
        })?;
        if removed > 0 {
            log::info!("Removed {} rows for missing files", removed);
        }
        Ok(removed)
    }

    /// Cleanup plus clearing of out-of-range technical values.
    ///
    /// # Errors
    ///
    /// [`StoreError`] on lock contention or any SQLite failure.
    pub fn repair(&mut self) -> Result<RepairReport, StoreError> {
        self.store.with_lock(|conn| {
            let tx = conn.transaction()?;
            let removed = remove_missing(&tx, &Table::ALL)?;
            let sample_rates_cleared = tx.execute(
                "UPDATE audio_metadata SET sample_rate = NULL
                 WHERE sample_rate IS NOT NULL AND (sample_rate <= 0 OR sample_rate > ?1)",
                [MAX_SAMPLE_RATE],
            )?;
            let bitrates_cleared = tx.execute(
                "UPDATE audio_metadata SET bitrate = NULL
                 WHERE bitrate IS NOT NULL AND (bitrate <= 0 OR bitrate > ?1)",
                [MAX_BITRATE],
            )?;
            tx.commit()?;
            Ok(RepairReport {
                removed,
                sample_rates_cleared,
                bitrates_cleared,
            })
        })
    }
}

/// A problem found by [`inspect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreIssue {
    /// Columns differ from the current layout.
    SchemaMismatch {
        table: Table,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    /// A row whose file no longer exists.
    MissingFile { table: Table, path: String },
    /// `audio_metadata.sample_rate` outside `1..=MAX_SAMPLE_RATE`.
    InvalidSampleRate { path: String, value: i64 },
    /// `audio_metadata.bitrate` outside `1..=MAX_BITRATE`.
    InvalidBitrate { path: String, value: i64 },
}

impl fmt::Display for StoreIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaMismatch {
                table,
                missing,
                unexpected,
            } => {
                write!(f, "Table structure mismatch in {table}")?;
                if !missing.is_empty() {
                    write!(f, "; missing: {}", missing.join(", "))?;
                }
                if !unexpected.is_empty() {
                    write!(f, "; unexpected: {}", unexpected.join(", "))?;
                }
                Ok(())
            }
            Self::MissingFile { table, path } => write!(f, "Missing file in {table}: {path}"),
            Self::InvalidSampleRate { path, value } => {
                write!(f, "Invalid sample rate for {path}: {value}")
            }
            Self::InvalidBitrate { path, value } => {
                write!(f, "Invalid bitrate for {path}: {value}")
            }
        }
    }
}

/// Look for schema drift, rows of missing files and out-of-range sample
/// rates and bitrates. Read-only.
///
/// # Errors
///
/// [`StoreError`] on lock contention or any SQLite failure.
pub fn inspect(store: &mut Store) -> Result<Vec<StoreIssue>, StoreError> {
    let issues = store.with_lock(|conn| {
        let mut issues = Vec::new();

        for table in Table::ALL {
            let actual = Store::columns_of(conn, table)?;
            let expected = expected_columns(table);
            let missing: Vec<String> = expected
                .iter()
                .copied()
                .filter(|&c| !actual.iter().any(|a| a.as_str() == c))
                .map(String::from)
                .collect();
            let unexpected: Vec<String> = actual
                .iter()
                .filter(|a| !expected.contains(&a.as_str()))
                .cloned()
                .collect();
            if !missing.is_empty() || !unexpected.is_empty() {
                issues.push(StoreIssue::SchemaMismatch {
                    table,
                    missing,
                    unexpected,
                });
            }
        }

        for table in Table::ALL {
            for path in Store::paths_in(conn, table)? {
                if is_missing(&path, table) {
                    issues.push(StoreIssue::MissingFile { table, path });
                }
            }
        }

        let out_of_range = |column: &str, max: i64| -> Result<Vec<(String, i64)>, StoreError> {
            let mut stmt = conn.prepare(&format!(
                "SELECT file_path, {column} FROM audio_metadata
                 WHERE {column} IS NOT NULL AND ({column} <= 0 OR {column} > ?1)
                 ORDER BY file_path"
            ))?;
            let rows = stmt
                .query_map([max], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        };
        for (path, value) in out_of_range("sample_rate", MAX_SAMPLE_RATE)? {
            issues.push(StoreIssue::InvalidSampleRate { path, value });
        }
        for (path, value) in out_of_range("bitrate", MAX_BITRATE)? {
            issues.push(StoreIssue::InvalidBitrate { path, value });
        }
        Ok(issues)
    })?;

    log::info!("Store check found {} issues", issues.len());
    Ok(issues)
}

/// Whether the file behind a row is gone. Undeterminable files count as
/// present.
fn is_missing(path: &str, table: Table) -> bool {
    match Path::new(path).try_exists() {
        Ok(exists) => !exists,
        Err(e) => {
            log::warn!("Keeping {} in {}: {}", path, table, e);
            false
        }
    }
}

fn remove_missing(conn: &rusqlite::Connection, tables: &[Table]) -> Result<usize, StoreError> {
    let mut removed = 0;
    for &table in tables {
        let sql = format!("DELETE FROM {} WHERE file_path = ?1", table.name());
        for path in Store::paths_in(conn, table)? {
            if is_missing(&path, table) {
                log::debug!("Removing {} from {}", path, table);
                removed += conn.execute(&sql, [&path])?;
            }
        }
    }
    Ok(removed)
}
