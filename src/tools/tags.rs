//! Tag and container reading through lofty.

use std::path::Path;

use lofty::{Accessor, AudioFile, FileType, ItemKey, Tag, TaggedFileExt};

use super::ToolError;
use crate::media::{non_empty, parse_number_pair, AudioMetadata, Container, StreamInfo, TrackTags};

/// Reads container type, technical properties and tags.
pub trait TagReader: Send + Sync {
    /// # Errors
    ///
    /// [`ToolError::Unsupported`] for formats the reader does not know,
    /// [`ToolError::Tags`] for files it cannot parse.
    fn read(&self, path: &Path) -> Result<AudioMetadata, ToolError>;
}

/// [`TagReader`] backed by lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagReader;

impl LoftyTagReader {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TagReader for LoftyTagReader {
    fn read(&self, path: &Path) -> Result<AudioMetadata, ToolError> {
        let tagged = lofty::read_from_path(path).map_err(|e| ToolError::Tags {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let container = container_for(tagged.file_type()).ok_or_else(|| {
            ToolError::Unsupported(path.to_path_buf())
        })?;

        let properties = tagged.properties();
        let stream = StreamInfo {
            codec: container.implied_codec().map(ToString::to_string),
            sample_rate: properties.sample_rate(),
            channels: properties.channels().map(u32::from),
            bit_depth: properties.bit_depth().map(u32::from),
            bitrate: properties
                .audio_bitrate()
                .or_else(|| properties.overall_bitrate())
                .map(|kbps| u64::from(kbps) * 1000),
        };
        let duration = properties.duration();
        let duration_ms = if duration.is_zero() {
            None
        } else {
            u64::try_from(duration.as_millis()).ok()
        };

        let tags = tagged
            .primary_tag()
            .or_else(|| tagged.first_tag())
            .map(read_tags)
            .unwrap_or_default();

        Ok(AudioMetadata::new(container, stream, tags, duration_ms))
    }
}

fn container_for(file_type: FileType) -> Option<Container> {
    Some(match file_type {
        FileType::Flac => Container::Flac,
        FileType::Mpeg => Container::Mp3,
        FileType::Mp4 => Container::Mp4,
        FileType::Vorbis => Container::Vorbis,
        FileType::Opus => Container::Opus,
        FileType::Wav => Container::Wav,
        FileType::Ape => Container::Ape,
        FileType::WavPack => Container::WavPack,
        FileType::Aac => Container::Other("AAC".to_string()),
        FileType::Aiff => Container::Other("AIFF".to_string()),
        _ => return None,
    })
}

fn read_tags(tag: &Tag) -> TrackTags {
    let text = |key: &ItemKey| non_empty(tag.get_string(key));

    // Accessor handles "3/12" in ID3 and the split fields elsewhere; the raw
    // string is a fallback for tags lofty leaves as plain text.
    let (raw_track, raw_track_total) =
        parse_number_pair(tag.get_string(&ItemKey::TrackNumber).unwrap_or_default());
    let (raw_disc, raw_disc_total) =
        parse_number_pair(tag.get_string(&ItemKey::DiscNumber).unwrap_or_default());

    TrackTags {
        track_number: tag.track().or(raw_track),
        track_total: tag.track_total().or(raw_track_total),
        disc_number: tag.disk().or(raw_disc),
        disc_total: tag.disk_total().or(raw_disc_total),
        artist: text(&ItemKey::TrackArtist),
        album: text(&ItemKey::AlbumTitle),
        album_artist: text(&ItemKey::AlbumArtist),
        title: text(&ItemKey::TrackTitle),
        isrc: text(&ItemKey::Isrc),
        upc: text(&ItemKey::Barcode),
        date: text(&ItemKey::RecordingDate).or_else(|| text(&ItemKey::Year)),
    }
}
