use audiotool::batch::{inspect, StoreIssue};
use audiotool::dispatch::DispatchConfig;
use audiotool::engine::{analyze_files, count_library, MetadataPipeline, Severity};
use audiotool::media::{AudioMetadata, Container, StreamInfo, TrackTags};
use audiotool::output::{AnalysisRow, AnalysisSummary};
use audiotool::scanner::{collect_targets, WalkerConfig};
use audiotool::store::{Store, StoreOptions, Table};
use audiotool::tools::{MediaProbe, TagReader, ToolError};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Reads `artist|album` from the file body; the extension picks the container.
struct BodyTags;

impl TagReader for BodyTags {
    fn read(&self, path: &Path) -> Result<AudioMetadata, ToolError> {
        let body = fs::read_to_string(path).map_err(|e| ToolError::Tags {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut parts = body.splitn(2, '|');
        let (artist, album) = match (parts.next(), parts.next()) {
            (Some(artist), Some(album)) => (artist.to_string(), album.to_string()),
            _ => {
                return Err(ToolError::Tags {
                    path: path.to_path_buf(),
                    message: "no tags".to_string(),
                })
            }
        };
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let container: Container = ext.parse().unwrap();
        let stream = StreamInfo {
            codec: container.implied_codec().map(str::to_string),
            sample_rate: Some(44_100),
            channels: Some(2),
            ..StreamInfo::default()
        };
        let tags = TrackTags {
            artist: Some(artist),
            album: Some(album),
            ..TrackTags::default()
        };
        Ok(AudioMetadata::new(container, stream, tags, None))
    }
}

/// AAC for `.m4a`, an 8 kHz / 8 bit stream for `.wav`, FLAC otherwise.
struct ExtensionProbe;

impl MediaProbe for ExtensionProbe {
    fn probe(&self, path: &Path) -> Result<StreamInfo, ToolError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let stream = |codec: &str, sample_rate, bit_depth| StreamInfo {
            codec: Some(codec.to_string()),
            sample_rate: Some(sample_rate),
            channels: Some(2),
            bit_depth,
            bitrate: Some(256_000),
        };
        match ext {
            "m4a" => Ok(stream("AAC", 44_100, None)),
            "wav" => Ok(stream("PCM", 8_000, Some(8))),
            "flac" => Ok(stream("FLAC", 96_000, Some(24))),
            _ => Err(ToolError::Failed {
                program: "ffprobe".to_string(),
                message: "unsupported".to_string(),
            }),
        }
    }
}

fn library(files: &[(&str, &str)]) -> (TempDir, Vec<PathBuf>) {
    let dir = TempDir::new().unwrap();
    let music = dir.path().join("music");
    fs::create_dir_all(&music).unwrap();
    for (name, body) in files {
        fs::write(music.join(name), body).unwrap();
    }
    let targets = collect_targets(&music, &WalkerConfig::default()).unwrap();
    (dir, targets)
}

fn reader() -> MetadataPipeline {
    MetadataPipeline::new(std::sync::Arc::new(BodyTags), std::sync::Arc::new(ExtensionProbe))
}

#[test]
fn test_count_groups_albums_and_labels_mp4_by_codec() {
    let (_dir, files) = library(&[
        ("01.flac", "Band|First"),
        ("02.flac", "Band|First"),
        ("03.m4a", "Band|Second"),
        ("broken.mp3", "no separator"),
    ]);

    let count = count_library(&reader(), files, &DispatchConfig::new("count").with_workers(2))
        .unwrap();

    let albums: Vec<(String, usize)> = count
        .albums
        .iter()
        .map(|a| (format!("{} - {}", a.artist, a.album), a.tracks.len()))
        .collect();
    assert_eq!(
        albums,
        vec![("Band - First".to_string(), 2), ("Band - Second".to_string(), 1)]
    );
    assert_eq!(count.codecs["FLAC"].songs, 2);
    assert_eq!(count.codecs["FLAC"].bytes, 2 * "Band|First".len() as u64);
    assert_eq!(count.codecs["AAC"].songs, 1);
    assert_eq!(count.songs(), 3);
    assert_eq!(count.errors.len(), 1);
    assert!(count.errors[0].0.ends_with("broken.mp3"));
}

#[test]
fn test_analyze_flags_low_quality_files() {
    let (_dir, files) = library(&[
        ("hi.flac", "x"),
        ("lo.wav", "x"),
        ("song.m4a", "x"),
        ("odd.ape", "x"),
    ]);

    let report = analyze_files(
        &ExtensionProbe,
        files,
        &DispatchConfig::new("analyze").with_workers(3),
    )
    .unwrap();

    let names: Vec<&str> = report
        .files
        .iter()
        .map(|f| f.path.file_name().unwrap().to_str().unwrap())
        .collect();
    assert_eq!(names, vec!["hi.flac", "lo.wav", "odd.ape", "song.m4a"]);

    let lo = &report.files[1];
    assert!(lo.has_warnings());
    assert_eq!(lo.findings.len(), 2);
    let m4a = &report.files[3];
    assert_eq!(m4a.findings[0].severity, Severity::Info);
    assert!(report.files[0].findings.is_empty());
    assert!(report.files[2].stream.is_err());

    let summary = AnalysisSummary::from_report(&report);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.analyzed, 3);
    assert_eq!(summary.flagged, 1);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.tallies.formats.len(), 3);

    let row = AnalysisRow::from(&report.files[2]);
    assert_eq!(row.error.as_deref(), Some("ffprobe failed: unsupported"));
}

#[test]
fn test_store_check_is_read_only() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("cache/audiotool.db");
    fs::create_dir_all(db.parent().unwrap()).unwrap();
    let gone = dir.path().join("gone.flac").to_string_lossy().into_owned();
    {
        let conn = rusqlite::Connection::open(&db).unwrap();
        conn.execute_batch(
            "CREATE TABLE audio_metadata (file_path TEXT PRIMARY KEY, sample_rate INTEGER, bitrate INTEGER, legacy_note TEXT);",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO audio_metadata (file_path, sample_rate, bitrate) VALUES (?1, 5000000, 0)",
            [&gone],
        )
        .unwrap();
    }

    let mut store = Store::open(
        StoreOptions::new(&db)
            .with_backup(false)
            .with_lock_timeout(Duration::from_secs(5)),
    )
    .unwrap();
    let issues = inspect(&mut store).unwrap();

    assert_eq!(
        issues,
        vec![
            StoreIssue::SchemaMismatch {
                table: Table::Metadata,
                missing: Vec::new(),
                unexpected: vec!["legacy_note".to_string()],
            },
            StoreIssue::MissingFile {
                table: Table::Metadata,
                path: gone.clone(),
            },
            StoreIssue::InvalidSampleRate {
                path: gone.clone(),
                value: 5_000_000,
            },
            StoreIssue::InvalidBitrate {
                path: gone,
                value: 0,
            },
        ]
    );
    // Running it twice finds the same rows: nothing was cleaned.
    assert_eq!(inspect(&mut store).unwrap().len(), 4);
    assert_eq!(store.counts().unwrap().metadata, 1);
}
