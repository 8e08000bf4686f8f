//! Typed audio metadata.
//!
//! An [`AudioMetadata`] value is what the metadata pipeline stores for each
//! file: the [`Container`] it was read from, the technical [`StreamInfo`]
//! and the descriptive [`TrackTags`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Container (file) format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Container {
    Flac,
    Mp3,
    Mp4,
    Vorbis,
    Opus,
    Wav,
    Ape,
    WavPack,
    /// Anything else, by its label
    Other(String),
}

impl Container {
    /// Stored label, e.g. `FLAC` or `MP4`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Flac => "FLAC",
            Self::Mp3 => "MP3",
            Self::Mp4 => "MP4",
            Self::Vorbis => "OGG",
            Self::Opus => "OPUS",
            Self::Wav => "WAV",
            Self::Ape => "APE",
            Self::WavPack => "WV",
            Self::Other(label) => label,
        }
    }

    /// MP3 (ID3) files never carry a UPC.
    #[must_use]
    pub fn supports_upc(&self) -> bool {
        !matches!(self, Self::Mp3)
    }

    /// Codec implied by the container alone, if there is exactly one.
    ///
    /// MP4 can hold AAC, ALAC or E-AC-3 and needs a probe.
    #[must_use]
    pub fn implied_codec(&self) -> Option<&'static str> {
        match self {
            Self::Flac => Some("FLAC"),
            Self::Mp3 => Some("MP3"),
            Self::Vorbis => Some("Vorbis"),
            Self::Opus => Some("Opus"),
            Self::Wav => Some("PCM"),
            Self::Ape => Some("Monkey's Audio"),
            Self::WavPack => Some("WavPack"),
            Self::Mp4 | Self::Other(_) => None,
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Container {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "FLAC" => Self::Flac,
            "MP3" => Self::Mp3,
            "MP4" | "M4A" => Self::Mp4,
            "OGG" | "VORBIS" => Self::Vorbis,
            "OPUS" => Self::Opus,
            "WAV" => Self::Wav,
            "APE" => Self::Ape,
            "WV" | "WAVPACK" => Self::WavPack,
            _ => Self::Other(s.to_string()),
        })
    }
}

impl From<Container> for String {
    fn from(container: Container) -> Self {
        container.as_str().to_string()
    }
}

impl TryFrom<String> for Container {
    type Error = std::convert::Infallible;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Map an ffprobe `codec_name` to the label stored for it.
#[must_use]
pub fn codec_label(codec_name: &str) -> String {
    match codec_name {
        "aac" => "AAC".to_string(),
        "alac" => "ALAC".to_string(),
        "eac3" | "ec-3" => "E-AC-3".to_string(),
        "flac" => "FLAC".to_string(),
        "mp3" => "MP3".to_string(),
        "opus" => "Opus".to_string(),
        "vorbis" => "Vorbis".to_string(),
        other => other.to_string(),
    }
}

/// Stream-level facts. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub codec: Option<String>,
    /// Hz
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub bit_depth: Option<u32>,
    /// Bits per second
    pub bitrate: Option<u64>,
}

impl StreamInfo {
    /// Fill fields that are `None` here from `other`.
    pub fn fill_from(&mut self, other: &StreamInfo) {
        if self.codec.is_none() {
            self.codec.clone_from(&other.codec);
        }
        self.sample_rate = self.sample_rate.or(other.sample_rate);
        self.channels = self.channels.or(other.channels);
        self.bit_depth = self.bit_depth.or(other.bit_depth);
        self.bitrate = self.bitrate.or(other.bitrate);
    }
}

/// Descriptive tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackTags {
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
}

/// Everything collected for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub container: Container,
    pub stream: StreamInfo,
    pub tags: TrackTags,
    pub duration_ms: Option<u64>,
}

impl AudioMetadata {
    /// Build a record, dropping a UPC the container cannot carry.
    #[must_use]
    pub fn new(
        container: Container,
        stream: StreamInfo,
        mut tags: TrackTags,
        duration_ms: Option<u64>,
    ) -> Self {
        if !container.supports_upc() {
            tags.upc = None;
        }
        Self {
            container,
            stream,
            tags,
            duration_ms,
        }
    }
}

/// Split a `"3/12"` style tag value into number and total.
///
/// Empty or non-numeric parts become `None`.
#[must_use]
pub fn parse_number_pair(value: &str) -> (Option<u32>, Option<u32>) {
    let mut parts = value.splitn(2, '/');
    let number = parts.next().and_then(|s| s.trim().parse().ok());
    let total = parts.next().and_then(|s| s.trim().parse().ok());
    (number, total)
}

/// Trim a tag string, mapping empty values to `None`.
#[must_use]
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_labels_round_trip() {
        for c in [
            Container::Flac,
            Container::Mp3,
            Container::Mp4,
            Container::Vorbis,
            Container::Opus,
            Container::Wav,
            Container::Ape,
            Container::WavPack,
        ] {
            assert_eq!(c.as_str().parse::<Container>().unwrap(), c);
        }
        assert_eq!(
            "DSF".parse::<Container>().unwrap(),
            Container::Other("DSF".to_string())
        );
    }

    #[test]
    fn test_mp3_drops_upc() {
        let tags = TrackTags {
            upc: Some("0123456789012".to_string()),
            ..TrackTags::default()
        };
        let meta = AudioMetadata::new(Container::Mp3, StreamInfo::default(), tags.clone(), None);
        assert_eq!(meta.tags.upc, None);

        let meta = AudioMetadata::new(Container::Flac, StreamInfo::default(), tags, None);
        assert_eq!(meta.tags.upc.as_deref(), Some("0123456789012"));
    }

    #[test]
    fn test_codec_label() {
        assert_eq!(codec_label("aac"), "AAC");
        assert_eq!(codec_label("alac"), "ALAC");
        assert_eq!(codec_label("eac3"), "E-AC-3");
        assert_eq!(codec_label("ec-3"), "E-AC-3");
        assert_eq!(codec_label("truehd"), "truehd");
    }

    #[test]
    fn test_parse_number_pair() {
        assert_eq!(parse_number_pair("3/12"), (Some(3), Some(12)));
        assert_eq!(parse_number_pair("7"), (Some(7), None));
        assert_eq!(parse_number_pair(" 1 / 2 "), (Some(1), Some(2)));
        assert_eq!(parse_number_pair(""), (None, None));
        assert_eq!(parse_number_pair("/9"), (None, Some(9)));
    }

    #[test]
    fn test_fill_from_keeps_existing() {
        let mut stream = StreamInfo {
            codec: Some("FLAC".to_string()),
            sample_rate: Some(44_100),
            ..StreamInfo::default()
        };
        stream.fill_from(&StreamInfo {
            codec: Some("flac".to_string()),
            sample_rate: Some(48_000),
            bit_depth: Some(24),
            ..StreamInfo::default()
        });
        assert_eq!(stream.codec.as_deref(), Some("FLAC"));
        assert_eq!(stream.sample_rate, Some(44_100));
        assert_eq!(stream.bit_depth, Some(24));
    }

    #[test]
    fn test_container_serde_as_label() {
        let json = serde_json::to_string(&Container::Vorbis).unwrap();
        assert_eq!(json, "\"OGG\"");
    }
}
