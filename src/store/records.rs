//! Row types for the three logical tables.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::media::{AudioMetadata, Container, StreamInfo, TrackTags};

/// Logical tables managed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Integrity,
    Metadata,
    Tracked,
}

impl Table {
    /// Every table, in display order.
    pub const ALL: [Table; 3] = [Table::Integrity, Table::Metadata, Table::Tracked];

    /// SQL table name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Integrity => "integrity_results",
            Self::Metadata => "audio_metadata",
            Self::Tracked => "tracked_files",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of an integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntegrityStatus {
    Passed,
    Failed,
}

impl IntegrityStatus {
    /// Stored label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for IntegrityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASSED" | "OK" => Ok(Self::Passed),
            "FAILED" | "ERROR" => Ok(Self::Failed),
            other => Err(format!("unknown integrity status '{other}'")),
        }
    }
}

/// Current time as stored in `last_checked` / `last_updated`.
#[must_use]
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// A row type that can be written to and read back from its table.
pub trait StoreRow: Sized {
    /// Table the row lives in.
    const TABLE: Table;

    /// Primary key.
    fn path(&self) -> &str;

    /// Insert or replace this row.
    ///
    /// # Errors
    ///
    /// Any SQLite error.
    fn upsert(&self, conn: &Connection) -> rusqlite::Result<()>;

    /// Read every row of the table.
    ///
    /// # Errors
    ///
    /// Any SQLite error, or a row whose values cannot be decoded.
    fn load_all(conn: &Connection) -> rusqlite::Result<Vec<Self>>;
}

/// A stored integrity verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityRecord {
    pub path: String,
    pub content_hash: Option<String>,
    pub mtime: Option<f64>,
    pub status: IntegrityStatus,
    /// ffmpeg diagnostic text for failures
    pub diagnostic: Option<String>,
    pub last_checked: String,
}

impl StoreRow for IntegrityRecord {
    const TABLE: Table = Table::Integrity;

    fn path(&self) -> &str {
        &self.path
    }

    fn upsert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO integrity_results
                (file_path, file_hash, mtime, status, diagnostic, last_checked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.path,
                self.content_hash,
                self.mtime,
                self.status.as_str(),
                self.diagnostic,
                self.last_checked,
            ],
        )?;
        Ok(())
    }

    fn load_all(conn: &Connection) -> rusqlite::Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT file_path, file_hash, mtime, status, diagnostic, last_checked
             FROM integrity_results ORDER BY file_path",
        )?;
        let rows = stmt.query_map([], |row| {
            let status: String = row.get(3)?;
            let status = status.parse::<IntegrityStatus>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            })?;
            Ok(Self {
                path: row.get(0)?,
                content_hash: row.get(1)?,
                mtime: opt_f64(row, 2)?,
                status,
                diagnostic: row.get(4)?,
                last_checked: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            })
        })?;
        rows.collect()
    }
}

/// Stored metadata for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub path: String,
    pub content_hash: Option<String>,
    pub mtime: Option<f64>,
    pub metadata: AudioMetadata,
    pub last_checked: String,
}

impl StoreRow for MetadataRecord {
    const TABLE: Table = Table::Metadata;

    fn path(&self) -> &str {
        &self.path
    }

    fn upsert(&self, conn: &Connection) -> rusqlite::Result<()> {
        let m = &self.metadata;
        conn.execute(
            "INSERT OR REPLACE INTO audio_metadata
                (file_path, file_hash, mtime, container, codec, sample_rate, bitrate,
                 bit_depth, channels, duration_ms, track_number, track_total,
                 disc_number, disc_total, artist, album, album_artist, title,
                 isrc, upc, date, last_checked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                     ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
            params![
                self.path,
                self.content_hash,
                self.mtime,
                m.container.as_str(),
                m.stream.codec,
                m.stream.sample_rate,
                m.stream.bitrate.and_then(|b| i64::try_from(b).ok()),
                m.stream.bit_depth,
                m.stream.channels,
                m.duration_ms.and_then(|d| i64::try_from(d).ok()),
                m.tags.track_number,
                m.tags.track_total,
                m.tags.disc_number,
                m.tags.disc_total,
                m.tags.artist,
                m.tags.album,
                m.tags.album_artist,
                m.tags.title,
                m.tags.isrc,
                m.tags.upc,
                m.tags.date,
                self.last_checked,
            ],
        )?;
        Ok(())
    }

    fn load_all(conn: &Connection) -> rusqlite::Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT file_path, file_hash, mtime, container, codec, sample_rate, bitrate,
                    bit_depth, channels, duration_ms, track_number, track_total,
                    disc_number, disc_total, artist, album, album_artist, title,
                    isrc, upc, date, last_checked
             FROM audio_metadata ORDER BY file_path",
        )?;
        let rows = stmt.query_map([], |row| {
            let container = row
                .get::<_, Option<String>>(3)?
                .map_or(Container::Other(String::new()), |s| {
                    s.parse().unwrap_or(Container::Other(s))
                });
            let stream = StreamInfo {
                codec: row.get(4)?,
                sample_rate: opt_u32(row, 5)?,
                bitrate: opt_u64(row, 6)?,
                bit_depth: opt_u32(row, 7)?,
                channels: opt_u32(row, 8)?,
            };
            let tags = TrackTags {
                track_number: opt_u32(row, 10)?,
                track_total: opt_u32(row, 11)?,
                disc_number: opt_u32(row, 12)?,
                disc_total: opt_u32(row, 13)?,
                artist: row.get(14)?,
                album: row.get(15)?,
                album_artist: row.get(16)?,
                title: row.get(17)?,
                isrc: row.get(18)?,
                upc: row.get(19)?,
                date: row.get(20)?,
            };
            Ok(Self {
                path: row.get(0)?,
                content_hash: row.get(1)?,
                mtime: opt_f64(row, 2)?,
                metadata: AudioMetadata {
                    container,
                    stream,
                    tags,
                    duration_ms: opt_u64(row, 9)?,
                },
                last_checked: row.get::<_, Option<String>>(21)?.unwrap_or_default(),
            })
        })?;
        rows.collect()
    }
}

/// A file seen by the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRecord {
    pub path: String,
    pub mtime: Option<f64>,
    pub last_updated: String,
}

impl StoreRow for TrackedRecord {
    const TABLE: Table = Table::Tracked;

    fn path(&self) -> &str {
        &self.path
    }

    fn upsert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO tracked_files (file_path, mtime, last_updated)
             VALUES (?1, ?2, ?3)",
            params![self.path, self.mtime, self.last_updated],
        )?;
        Ok(())
    }

    fn load_all(conn: &Connection) -> rusqlite::Result<Vec<Self>> {
        let mut stmt = conn
            .prepare("SELECT file_path, mtime, last_updated FROM tracked_files ORDER BY file_path")?;
        let rows = stmt.query_map([], |row| {
            Ok(Self {
                path: row.get(0)?,
                mtime: opt_f64(row, 1)?,
                last_updated: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            })
        })?;
        rows.collect()
    }
}

// Older databases stored numbers as text ("3", "44100"); accept both.

fn opt_i64(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<i64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i),
        ValueRef::Real(f) => Some(f as i64),
        ValueRef::Text(t) => std::str::from_utf8(t)
            .ok()
            .and_then(|s| crate::media::parse_number_pair(s).0)
            .map(i64::from),
        ValueRef::Blob(_) => None,
    })
}

fn opt_u32(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u32>> {
    Ok(opt_i64(row, idx)?.and_then(|v| u32::try_from(v).ok()))
}

fn opt_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    Ok(opt_i64(row, idx)?.and_then(|v| u64::try_from(v).ok()))
}

fn opt_f64(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<f64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Real(f) => Some(f),
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(|s| s.parse().ok()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    })
}
