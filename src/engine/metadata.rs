//! Metadata collection.

use std::sync::Arc;

use super::{Job, Pipeline};
use crate::media::{AudioMetadata, Container};
use crate::store::{timestamp_now, MetadataRecord};
use crate::tools::{MediaProbe, TagReader};

/// Reads tags and properties, asking the probe for whatever the tag
/// reader cannot tell (the codec inside MP4, missing stream facts).
#[derive(Clone)]
pub struct MetadataPipeline {
    tags: Arc<dyn TagReader>,
    probe: Arc<dyn MediaProbe>,
}

impl MetadataPipeline {
    #[must_use]
    pub fn new(tags: Arc<dyn TagReader>, probe: Arc<dyn MediaProbe>) -> Self {
        Self { tags, probe }
    }

    /// Tag reader result, completed from the probe when needed.
    ///
    /// # Errors
    ///
    /// A message when the tag reader rejects the file. Probe failures only
    /// leave fields empty.
    pub fn extract(&self, path: &std::path::Path) -> Result<AudioMetadata, String> {
        let mut metadata = self.tags.read(path).map_err(|e| e.to_string())?;

        if needs_probe(&metadata) {
            match self.probe.probe(path) {
                Ok(info) => {
                    // The probe names the actual stream codec; prefer it.
                    if info.codec.is_some() {
                        metadata.stream.codec.clone_from(&info.codec);
                    }
                    metadata.stream.fill_from(&info);
                }
                Err(e) => log::warn!("Probe failed for {}: {}", path.display(), e),
            }
        }
        Ok(metadata)
    }
}

fn needs_probe(metadata: &AudioMetadata) -> bool {
    let stream = &metadata.stream;
    matches!(metadata.container, Container::Mp4)
        || stream.codec.is_none()
        || stream.sample_rate.is_none()
        || stream.channels.is_none()
}

impl std::fmt::Debug for MetadataPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataPipeline").finish_non_exhaustive()
    }
}

impl Pipeline for MetadataPipeline {
    type Record = MetadataRecord;

    fn phase(&self) -> &'static str {
        "extract"
    }

    fn tracks_content(&self) -> bool {
        true
    }

    fn process(&self, job: &Job<MetadataRecord>) -> Result<MetadataRecord, String> {
        Ok(MetadataRecord {
            path: job.key(),
            content_hash: job.content_hash.clone(),
            mtime: Some(job.mtime),
            metadata: self.extract(&job.path)?,
            last_checked: timestamp_now(),
        })
    }
}
