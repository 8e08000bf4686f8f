//! Plain file tracking by modification time.

use super::{BatchReport, Job, Outcome, Pipeline};
use crate::store::{timestamp_now, TrackedRecord};

/// Records each file's mtime. No content hash, no external tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackerPipeline;

impl TrackerPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pipeline for TrackerPipeline {
    type Record = TrackedRecord;

    fn phase(&self) -> &'static str {
        "track"
    }

    fn tracks_content(&self) -> bool {
        false
    }

    fn process(&self, job: &Job<TrackedRecord>) -> Result<TrackedRecord, String> {
        Ok(TrackedRecord {
            path: job.key(),
            mtime: Some(job.mtime),
            last_updated: timestamp_now(),
        })
    }
}

/// How a tracked file changed since the last run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackChange {
    Added,
    Updated,
    Unchanged,
}

impl TrackChange {
    /// Classify an outcome; `None` for per-file errors.
    #[must_use]
    pub fn of(outcome: &Outcome<TrackedRecord>) -> Option<Self> {
        match outcome {
            Outcome::Cached(_) => Some(Self::Unchanged),
            Outcome::Refreshed(_) | Outcome::Fresh { replaced: true, .. } => Some(Self::Updated),
            Outcome::Fresh { replaced: false, .. } => Some(Self::Added),
            Outcome::Failed { .. } => None,
        }
    }
}

/// Tally of a tracker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TrackSummary {
    pub total: usize,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub errors: usize,
    pub removed: usize,
}

impl TrackSummary {
    #[must_use]
    pub fn from_report(report: &BatchReport<TrackedRecord>) -> Self {
        let mut summary = Self {
            total: report.outcomes.len(),
            removed: report.removed,
            ..Self::default()
        };
        for outcome in &report.outcomes {
            match TrackChange::of(outcome) {
                Some(TrackChange::Added) => summary.added += 1,
                Some(TrackChange::Updated) => summary.updated += 1,
                Some(TrackChange::Unchanged) => summary.unchanged += 1,
                None => summary.errors += 1,
            }
        }
        summary
    }
}
