//! Summaries and flat result rows shared by the console and the exporters.

use serde::Serialize;

use crate::engine::{
    AnalysisReport, AnalysisTallies, BatchReport, FileAnalysis, Outcome, VerifyEntry, VerifyStatus,
};
use crate::store::{IntegrityRecord, IntegrityStatus, MetadataRecord, StoreRow};

fn duration_ms<R>(report: &BatchReport<R>) -> u64 {
    u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX)
}

/// Counts for an integrity check run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    /// Reused without any work
    pub cached: usize,
    /// Content unchanged, mtime re-stamped
    pub refreshed: usize,
    /// Decoded by the validator this run
    pub checked: usize,
    pub not_found: usize,
    pub removed: usize,
    pub duration_ms: u64,
}

impl CheckSummary {
    #[must_use]
    pub fn from_report(report: &BatchReport<IntegrityRecord>) -> Self {
        let passed = report
            .records()
            .filter(|r| r.status == IntegrityStatus::Passed)
            .count();
        let failed = report
            .records()
            .filter(|r| r.status == IntegrityStatus::Failed)
            .count();
        Self {
            total: report.outcomes.len(),
            passed,
            failed,
            errors: report.failed(),
            cached: report.cached(),
            refreshed: report.refreshed(),
            checked: report.fresh(),
            not_found: report.not_found.len(),
            removed: report.removed,
            duration_ms: duration_ms(report),
        }
    }
}

/// Counts for a metadata run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetadataSummary {
    pub total: usize,
    pub extracted: usize,
    /// Cached or re-stamped
    pub cached: usize,
    pub errors: usize,
    pub not_found: usize,
    pub removed: usize,
    pub duration_ms: u64,
}

impl MetadataSummary {
    #[must_use]
    pub fn from_report(report: &BatchReport<MetadataRecord>) -> Self {
        Self {
            total: report.outcomes.len(),
            extracted: report.fresh(),
            cached: report.cached() + report.refreshed(),
            errors: report.failed(),
            not_found: report.not_found.len(),
            removed: report.removed,
            duration_ms: duration_ms(report),
        }
    }
}

/// Counts for `db verify`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerifySummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub missing: usize,
    pub changed: usize,
    pub errors: usize,
}

impl VerifySummary {
    #[must_use]
    pub fn from_entries(entries: &[VerifyEntry]) -> Self {
        let mut summary = Self {
            total: entries.len(),
            ..Self::default()
        };
        for entry in entries {
            match entry.status {
                VerifyStatus::Passed => summary.passed += 1,
                VerifyStatus::Failed => summary.failed += 1,
                VerifyStatus::Missing => summary.missing += 1,
                VerifyStatus::Changed => summary.changed += 1,
                VerifyStatus::Error => summary.errors += 1,
            }
        }
        summary
    }
}

/// Counts and tallies for `analyze`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisSummary {
    pub total: usize,
    pub analyzed: usize,
    /// Files with at least one warning
    pub flagged: usize,
    pub errors: usize,
    pub tallies: AnalysisTallies,
    pub duration_ms: u64,
}

impl AnalysisSummary {
    #[must_use]
    pub fn from_report(report: &AnalysisReport) -> Self {
        Self {
            total: report.files.len(),
            analyzed: report.analyzed(),
            flagged: report.flagged(),
            errors: report.errors(),
            tallies: report.tallies(),
            duration_ms: u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// One line of an integrity export. Per-file errors appear with status
/// `ERROR` and the message in `diagnostic`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityRow {
    pub path: String,
    pub status: String,
    pub diagnostic: Option<String>,
    pub mtime: Option<f64>,
    pub file_hash: Option<String>,
    pub last_checked: Option<String>,
}

impl IntegrityRow {
    #[must_use]
    pub fn from_outcome(outcome: &Outcome<IntegrityRecord>) -> Self {
        match outcome {
            Outcome::Failed { path, error } => Self {
                path: path.to_string_lossy().into_owned(),
                status: "ERROR".to_string(),
                diagnostic: Some(error.clone()),
                mtime: None,
                file_hash: None,
                last_checked: None,
            },
            Outcome::Cached(r) | Outcome::Refreshed(r) | Outcome::Fresh { record: r, .. } => {
                Self {
                    path: r.path().to_string(),
                    status: r.status.as_str().to_string(),
                    diagnostic: r.diagnostic.clone(),
                    mtime: r.mtime,
                    file_hash: r.content_hash.clone(),
                    last_checked: Some(r.last_checked.clone()),
                }
            }
        }
    }
}

/// One line of a metadata export, flattened for CSV.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataRow {
    pub path: String,
    pub error: Option<String>,
    pub container: Option<String>,
    pub codec: Option<String>,
    pub sample_rate: Option<u32>,
    pub bitrate: Option<u64>,
    pub bit_depth: Option<u32>,
    pub channels: Option<u32>,
    pub duration_ms: Option<u64>,
    pub track_number: Option<u32>,
    pub track_total: Option<u32>,
    pub disc_number: Option<u32>,
    pub disc_total: Option<u32>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub title: Option<String>,
    pub isrc: Option<String>,
    pub upc: Option<String>,
    pub date: Option<String>,
    pub last_checked: Option<String>,
}

impl MetadataRow {
    #[must_use]
    pub fn from_outcome(outcome: &Outcome<MetadataRecord>) -> Self {
        match outcome {
            Outcome::Failed { path, error } => Self {
                path: path.to_string_lossy().into_owned(),
                error: Some(error.clone()),
                ..Self::default()
            },
            Outcome::Cached(r) | Outcome::Refreshed(r) | Outcome::Fresh { record: r, .. } => {
                Self::from_record(r)
            }
        }
    }

    #[must_use]
    pub fn from_record(r: &MetadataRecord) -> Self {
        let m = &r.metadata;
        Self {
            path: r.path.clone(),
            error: None,
            container: Some(m.container.to_string()).filter(|c| !c.is_empty()),
            codec: m.stream.codec.clone(),
            sample_rate: m.stream.sample_rate,
            bitrate: m.stream.bitrate,
            bit_depth: m.stream.bit_depth,
            channels: m.stream.channels,
            duration_ms: m.duration_ms,
            track_number: m.tags.track_number,
            track_total: m.tags.track_total,
            disc_number: m.tags.disc_number,
            disc_total: m.tags.disc_total,
            artist: m.tags.artist.clone(),
            album: m.tags.album.clone(),
            album_artist: m.tags.album_artist.clone(),
            title: m.tags.title.clone(),
            isrc: m.tags.isrc.clone(),
            upc: m.tags.upc.clone(),
            date: m.tags.date.clone(),
            last_checked: Some(r.last_checked.clone()),
        }
    }
}

/// One line of a `db verify` export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyRow {
    pub path: String,
    pub status: String,
    pub stored_status: String,
    pub stored_mtime: Option<f64>,
    pub current_mtime: Option<f64>,
    pub last_checked: String,
    pub detail: Option<String>,
}

impl From<&VerifyEntry> for VerifyRow {
    fn from(entry: &VerifyEntry) -> Self {
        Self {
            path: entry.path.clone(),
            status: entry.status.as_str().to_string(),
            stored_status: entry.stored_status.as_str().to_string(),
            stored_mtime: entry.stored_mtime,
            current_mtime: entry.current_mtime,
            last_checked: entry.last_checked.clone(),
            detail: entry.detail.clone(),
        }
    }
}

/// One line of an `analyze` export. Findings are joined with `; `.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisRow {
    pub path: String,
    pub codec: Option<String>,
    pub sample_rate: Option<u32>,
    pub bit_depth: Option<u32>,
    pub channels: Option<u32>,
    pub bitrate: Option<u64>,
    pub findings: Option<String>,
    pub error: Option<String>,
}

impl From<&FileAnalysis> for AnalysisRow {
    fn from(file: &FileAnalysis) -> Self {
        let path = file.path.to_string_lossy().into_owned();
        match &file.stream {
            Err(error) => Self {
                path,
                error: Some(error.clone()),
                ..Self::default()
            },
            Ok(stream) => Self {
                path,
                codec: stream.codec.clone(),
                sample_rate: stream.sample_rate,
                bit_depth: stream.bit_depth,
                channels: stream.channels,
                bitrate: stream.bitrate,
                findings: Some(
                    file.findings
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; "),
                )
                .filter(|f| !f.is_empty()),
                error: None,
            },
        }
    }
}
