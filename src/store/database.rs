//! Store connection, schema and read operations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

use super::lock::StoreLock;
use super::records::{StoreRow, Table};
use super::StoreError;

/// Columns every table must have. Missing ones are added as nullable columns.
const EXPECTED_COLUMNS: &[(&str, &str, &str)] = &[
    ("integrity_results", "file_hash", "TEXT"),
    ("integrity_results", "mtime", "REAL"),
    ("integrity_results", "diagnostic", "TEXT"),
    ("integrity_results", "last_checked", "TEXT"),
    ("audio_metadata", "file_hash", "TEXT"),
    ("audio_metadata", "mtime", "REAL"),
    ("audio_metadata", "container", "TEXT"),
    ("audio_metadata", "codec", "TEXT"),
    ("audio_metadata", "sample_rate", "INTEGER"),
    ("audio_metadata", "bitrate", "INTEGER"),
    ("audio_metadata", "bit_depth", "INTEGER"),
    ("audio_metadata", "channels", "INTEGER"),
    ("audio_metadata", "duration_ms", "INTEGER"),
    ("audio_metadata", "track_number", "INTEGER"),
    ("audio_metadata", "track_total", "INTEGER"),
    ("audio_metadata", "disc_number", "INTEGER"),
    ("audio_metadata", "disc_total", "INTEGER"),
    ("audio_metadata", "artist", "TEXT"),
    ("audio_metadata", "album", "TEXT"),
    ("audio_metadata", "album_artist", "TEXT"),
    ("audio_metadata", "title", "TEXT"),
    ("audio_metadata", "isrc", "TEXT"),
    ("audio_metadata", "upc", "TEXT"),
    ("audio_metadata", "date", "TEXT"),
    ("audio_metadata", "last_checked", "TEXT"),
    ("tracked_files", "mtime", "REAL"),
    ("tracked_files", "last_updated", "TEXT"),
];

/// Connection settings.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Database file
    pub path: PathBuf,
    /// Lock file; `<path>.lock` when unset
    pub lock_path: Option<PathBuf>,
    /// SQLite busy timeout
    pub busy_timeout: Duration,
    /// Maximum wait for the advisory lock
    pub lock_timeout: Duration,
    /// Back up the database before each batch commit
    pub backup: bool,
}

impl StoreOptions {
    /// Options for `path` with the default timeouts (5 s busy, 60 s lock).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_path: None,
            busy_timeout: Duration::from_secs(5),
            lock_timeout: Duration::from_secs(60),
            backup: true,
        }
    }

    #[must_use]
    pub fn with_lock_path(mut self, lock_path: impl Into<PathBuf>) -> Self {
        self.lock_path = Some(lock_path.into());
        self
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    /// The lock file actually used.
    #[must_use]
    pub fn resolved_lock_path(&self) -> PathBuf {
        self.lock_path.clone().unwrap_or_else(|| {
            let mut name = self.path.clone().into_os_string();
            name.push(".lock");
            PathBuf::from(name)
        })
    }

    /// Where [`Store::backup`] writes.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".bak");
        PathBuf::from(name)
    }
}

/// Row counts for `db stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreCounts {
    pub integrity_passed: usize,
    pub integrity_failed: usize,
    pub metadata: usize,
    pub tracked: usize,
}

impl StoreCounts {
    /// All integrity rows.
    #[must_use]
    pub fn integrity_total(&self) -> usize {
        self.integrity_passed + self.integrity_failed
    }
}

/// Handle on the result store.
pub struct Store {
    conn: Connection,
    lock: StoreLock,
    options: StoreOptions,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.options.path)
            .field("lock", &self.lock.path())
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Open or create the store.
    ///
    /// Creates the parent directory, switches the database to WAL mode, sets
    /// the busy timeout, then creates missing tables, adds missing columns
    /// and imports legacy tables, all under the lock.
    ///
    /// # Errors
    ///
    /// [`StoreError`] if the file cannot be opened, the lock cannot be taken
    /// or the schema cannot be brought up to date.
    pub fn open(options: StoreOptions) -> Result<Self, StoreError> {
        if let Some(parent) = options.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let lock = StoreLock::open(&options.resolved_lock_path())?;

        let conn = {
            let _guard = lock.acquire(options.lock_timeout)?;
            let conn = Connection::open(&options.path)?;
            conn.busy_timeout(options.busy_timeout)?;
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            if !mode.eq_ignore_ascii_case("wal") {
                log::warn!("Store journal mode is {} instead of WAL", mode);
            }
            conn
        };

        let mut store = Self {
            conn,
            lock,
            options,
        };
        store.with_lock(|conn| {
            let tx = conn.transaction()?;
            init_schema(&tx)?;
            migrate_columns(&tx)?;
            import_legacy(&tx)?;
            tx.commit()?;
            Ok(())
        })?;

        log::debug!("Opened store {}", store.options.path.display());
        Ok(store)
    }

    /// Store settings.
    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Run `critical_section` while holding the advisory lock.
    ///
    /// # Errors
    ///
    /// [`StoreError::Contention`] if the lock cannot be taken in time, or
    /// whatever the critical section returns.
    pub fn with_lock<T, F>(&mut self, critical_section: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let _guard = self.lock.acquire(self.options.lock_timeout)?;
        critical_section(&mut self.conn)
    }

    /// Load `path -> row` for one table under the lock.
    ///
    /// # Errors
    ///
    /// See [`Store::with_lock`].
    pub fn load_index<R: StoreRow>(&mut self) -> Result<HashMap<String, R>, StoreError> {
        let rows = self.with_lock(|conn| Ok(R::load_all(conn)?))?;
        log::debug!("Loaded {} rows from {}", rows.len(), R::TABLE);
        Ok(rows
            .into_iter()
            .map(|row| (row.path().to_string(), row))
            .collect())
    }

    /// All rows of one table, ordered by path.
    ///
    /// # Errors
    ///
    /// See [`Store::with_lock`].
    pub fn list<R: StoreRow>(&mut self) -> Result<Vec<R>, StoreError> {
        self.with_lock(|conn| Ok(R::load_all(conn)?))
    }

    /// Per-table and per-status row counts.
    ///
    /// # Errors
    ///
    /// See [`Store::with_lock`].
    pub fn counts(&mut self) -> Result<StoreCounts, StoreError> {
        self.with_lock(|conn| {
            let count = |sql: &str| -> Result<usize, StoreError> {
                let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(usize::try_from(n).unwrap_or(0))
            };
            Ok(StoreCounts {
                integrity_passed: count(
                    "SELECT COUNT(*) FROM integrity_results WHERE status = 'PASSED'",
                )?,
                integrity_failed: count(
                    "SELECT COUNT(*) FROM integrity_results WHERE status = 'FAILED'",
                )?,
                metadata: count("SELECT COUNT(*) FROM audio_metadata")?,
                tracked: count("SELECT COUNT(*) FROM tracked_files")?,
            })
        })
    }

    /// Paths stored in `table`. Call from inside a critical section.
    pub(crate) fn paths_in(conn: &Connection, table: Table) -> Result<Vec<String>, StoreError> {
        let mut stmt = conn.prepare(&format!("SELECT file_path FROM {}", table.name()))?;
        let paths = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(paths)
    }

    /// Column names `table` actually has. Call from inside a critical section.
    pub(crate) fn columns_of(conn: &Connection, table: Table) -> Result<Vec<String>, StoreError> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
        let names = stmt
            .query_map([table.name()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Copy the database to `<path>.bak` with `VACUUM INTO`.
    ///
    /// Call from inside a critical section; the previous backup is replaced.
    pub(crate) fn backup_into(conn: &Connection, backup_path: &Path) -> Result<(), StoreError> {
        match std::fs::remove_file(backup_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(backup_path, e)),
        }
        conn.execute("VACUUM INTO ?1", [backup_path.to_string_lossy().into_owned()])?;
        log::debug!("Backed up store to {}", backup_path.display());
        Ok(())
    }
}

/// Columns `table` has once the schema is up to date.
pub(crate) fn expected_columns(table: Table) -> Vec<&'static str> {
    let mut columns = vec!["file_path"];
    if table == Table::Integrity {
        columns.push("status");
    }
    columns.extend(
        EXPECTED_COLUMNS
            .iter()
            .filter(|(t, _, _)| *t == table.name())
            .map(|(_, column, _)| *column),
    );
    columns
}

/// Create any missing table. Existing rows are untouched.
pub(crate) fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS integrity_results (
            file_path TEXT PRIMARY KEY,
            file_hash TEXT,
            mtime REAL,
            status TEXT NOT NULL,
            diagnostic TEXT,
            last_checked TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_integrity_status ON integrity_results(status);

        CREATE TABLE IF NOT EXISTS audio_metadata (
            file_path TEXT PRIMARY KEY,
            file_hash TEXT,
            mtime REAL,
            container TEXT,
            codec TEXT,
            sample_rate INTEGER,
            bitrate INTEGER,
            bit_depth INTEGER,
            channels INTEGER,
            duration_ms INTEGER,
            track_number INTEGER,
            track_total INTEGER,
            disc_number INTEGER,
            disc_total INTEGER,
            artist TEXT,
            album TEXT,
            album_artist TEXT,
            title TEXT,
            isrc TEXT,
            upc TEXT,
            date TEXT,
            last_checked TEXT
        );

        CREATE TABLE IF NOT EXISTS tracked_files (
            file_path TEXT PRIMARY KEY,
            mtime REAL,
            last_updated TEXT
        );
        ",
    )?;
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, StoreError> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, StoreError> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Add nullable columns that older databases lack.
fn migrate_columns(conn: &Connection) -> Result<(), StoreError> {
    for (table, column, decl) in EXPECTED_COLUMNS {
        if !has_column(conn, table, column)? {
            log::info!("Adding column {}.{}", table, column);
            conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"), [])?;
        }
    }
    Ok(())
}

/// Copy rows from the older table layout. The old tables are kept.
fn import_legacy(conn: &Connection) -> Result<(), StoreError> {
    for (legacy, status) in [("passed_files", "PASSED"), ("failed_files", "FAILED")] {
        if !table_exists(conn, legacy)? {
            continue;
        }
        let hash = legacy_column(conn, legacy, "file_hash")?;
        let mtime = legacy_column(conn, legacy, "mtime")?;
        let checked = legacy_column(conn, legacy, "last_checked")?;
        let imported = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO integrity_results
                    (file_path, file_hash, mtime, status, diagnostic, last_checked)
                 SELECT file_path, {hash}, {mtime}, '{status}', NULL, {checked} FROM {legacy}"
            ),
            [],
        )?;
        if imported > 0 {
            log::info!("Imported {} rows from legacy table {}", imported, legacy);
        }
    }

    if table_exists(conn, "file_tracker")? {
        let mtime = legacy_column(conn, "file_tracker", "mtime")?;
        let updated = legacy_column(conn, "file_tracker", "last_updated")?;
        let imported = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO tracked_files (file_path, mtime, last_updated)
                 SELECT file_path, {mtime}, {updated} FROM file_tracker"
            ),
            [],
        )?;
        if imported > 0 {
            log::info!("Imported {} rows from legacy table file_tracker", imported);
        }
    }
    Ok(())
}

fn legacy_column(conn: &Connection, table: &str, column: &str) -> Result<String, StoreError> {
    Ok(if has_column(conn, table, column)? {
        column.to_string()
    } else {
        "NULL".to_string()
    })
}
