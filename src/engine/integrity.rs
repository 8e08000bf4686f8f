//! Integrity checking.

use std::sync::Arc;

use super::{Job, Pipeline};
use crate::store::{timestamp_now, IntegrityRecord, IntegrityStatus};
use crate::tools::StreamValidator;

/// Validates each file's stream and records PASSED or FAILED.
///
/// A corrupt file or a decoder timeout is a FAILED row. A validator that
/// cannot run at all yields a per-file error and nothing is stored.
#[derive(Clone)]
pub struct IntegrityPipeline {
    validator: Arc<dyn StreamValidator>,
}

impl IntegrityPipeline {
    #[must_use]
    pub fn new(validator: Arc<dyn StreamValidator>) -> Self {
        Self { validator }
    }
}

impl std::fmt::Debug for IntegrityPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityPipeline").finish_non_exhaustive()
    }
}

impl Pipeline for IntegrityPipeline {
    type Record = IntegrityRecord;

    fn phase(&self) -> &'static str {
        "check"
    }

    fn tracks_content(&self) -> bool {
        true
    }

    fn process(&self, job: &Job<IntegrityRecord>) -> Result<IntegrityRecord, String> {
        let validation = self
            .validator
            .validate(&job.path)
            .map_err(|e| e.to_string())?;

        if validation.status == IntegrityStatus::Failed {
            log::debug!("FAILED {}: {}", job.path.display(), validation.diagnostic);
        }

        Ok(IntegrityRecord {
            path: job.key(),
            content_hash: job.content_hash.clone(),
            mtime: Some(job.mtime),
            status: validation.status,
            diagnostic: Some(validation.diagnostic).filter(|d| !d.is_empty()),
            last_checked: timestamp_now(),
        })
    }
}
