//! Library census: albums, songs and disk usage per codec.
//!
//! Nothing is read from or written to the store. Every file is read with
//! the tag reader (and the probe, for MP4) on the worker pool.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::MetadataPipeline;
use crate::dispatch::{dispatch, DispatchConfig, DispatchError, PathResult, Route};
use crate::media::{AudioMetadata, Container};

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_ALBUM: &str = "Unknown Album";

/// What one file contributes to the census.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountedTrack {
    pub path: PathBuf,
    /// Album artist, else track artist
    pub artist: String,
    pub album: String,
    pub codec: String,
    /// File size in bytes
    pub size: u64,
}

impl CountedTrack {
    #[must_use]
    pub fn new(path: PathBuf, metadata: &AudioMetadata, size: u64) -> Self {
        let tags = &metadata.tags;
        Self {
            path,
            artist: tags
                .album_artist
                .clone()
                .or_else(|| tags.artist.clone())
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            album: tags
                .album
                .clone()
                .unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
            codec: codec_of(metadata),
            size,
        }
    }
}

/// MP4 is labelled by the codec inside it, everything else by container.
fn codec_of(metadata: &AudioMetadata) -> String {
    match metadata.container {
        Container::Mp4 => metadata
            .stream
            .codec
            .clone()
            .unwrap_or_else(|| Container::Mp4.to_string()),
        ref other => other.to_string(),
    }
}

/// Worker result for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Counted {
    Track(CountedTrack),
    Failed { path: PathBuf, error: String },
}

impl PathResult for Counted {
    fn path(&self) -> &Path {
        match self {
            Self::Track(track) => &track.path,
            Self::Failed { path, .. } => path,
        }
    }
}

/// One album and its files, in path order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumCount {
    pub artist: String,
    pub album: String,
    pub tracks: Vec<PathBuf>,
}

/// Songs and bytes for one codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CodecTally {
    pub songs: usize,
    pub bytes: u64,
}

/// Census of a set of files.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LibraryCount {
    /// Ordered by artist, then album
    pub albums: Vec<AlbumCount>,
    pub codecs: BTreeMap<String, CodecTally>,
    pub errors: Vec<(PathBuf, String)>,
    #[serde(skip)]
    pub duration: Duration,
}

impl LibraryCount {
    /// Group worker results into albums and codec tallies.
    #[must_use]
    pub fn from_results(results: Vec<Counted>) -> Self {
        let mut albums: BTreeMap<(String, String), Vec<PathBuf>> = BTreeMap::new();
        let mut codecs: BTreeMap<String, CodecTally> = BTreeMap::new();
        let mut errors = Vec::new();

        for result in results {
            match result {
                Counted::Track(track) => {
                    let tally = codecs.entry(track.codec).or_default();
                    tally.songs += 1;
                    tally.bytes += track.size;
                    albums
                        .entry((track.artist, track.album))
                        .or_default()
                        .push(track.path);
                }
                Counted::Failed { path, error } => errors.push((path, error)),
            }
        }
        errors.sort();

        Self {
            albums: albums
                .into_iter()
                .map(|((artist, album), mut tracks)| {
                    tracks.sort();
                    AlbumCount {
                        artist,
                        album,
                        tracks,
                    }
                })
                .collect(),
            codecs,
            errors,
            duration: Duration::ZERO,
        }
    }

    /// Files that were read successfully.
    #[must_use]
    pub fn songs(&self) -> usize {
        self.codecs.values().map(|t| t.songs).sum()
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.codecs.values().map(|t| t.bytes).sum()
    }
}

/// Read every file and build the census.
///
/// Unreadable files are listed in [`LibraryCount::errors`] and left out of
/// the tallies.
///
/// # Errors
///
/// [`DispatchError`] if interrupted or the pool cannot start.
pub fn count_library(
    reader: &MetadataPipeline,
    files: Vec<PathBuf>,
    config: &DispatchConfig,
) -> Result<LibraryCount, DispatchError> {
    let started = Instant::now();
    log::info!("{}: {} files", config.phase, files.len());

    let work = |path: PathBuf| -> Counted {
        let size = match std::fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                return Counted::Failed {
                    error: e.to_string(),
                    path,
                }
            }
        };
        match reader.extract(&path) {
            Ok(metadata) => Counted::Track(CountedTrack::new(path, &metadata, size)),
            Err(error) => {
                log::debug!("{}: {}", path.display(), error);
                Counted::Failed { path, error }
            }
        }
    };
    let report = dispatch(files, Route::<PathBuf, Counted>::Work, work, config)?;

    let mut count = LibraryCount::from_results(report.results);
    count.duration = started.elapsed();
    log::info!(
        "{}: {} albums, {} songs, {} unreadable in {:.2?}",
        config.phase,
        count.albums.len(),
        count.songs(),
        count.errors.len(),
        count.duration
    );
    Ok(count)
}
