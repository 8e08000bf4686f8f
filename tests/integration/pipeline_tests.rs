use audiotool::dispatch::DispatchConfig;
use audiotool::engine::{
    run_batch, BatchOptions, IntegrityPipeline, MetadataPipeline, Outcome, TrackChange,
    TrackSummary, TrackerPipeline,
};
use audiotool::media::{AudioMetadata, Container, StreamInfo, TrackTags};
use audiotool::scanner::{collect_targets, WalkerConfig};
use audiotool::store::{
    IntegrityRecord, IntegrityStatus, MetadataRecord, Store, StoreOptions, TrackedRecord,
};
use audiotool::tools::{MediaProbe, StreamValidator, TagReader, ToolError, Validation};
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Passes every file unless its content contains "corrupt"; counts calls.
struct CountingValidator {
    calls: Arc<AtomicUsize>,
}

impl StreamValidator for CountingValidator {
    fn validate(&self, path: &Path) -> Result<Validation, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = fs::read_to_string(path).unwrap_or_default();
        if content.contains("corrupt") {
            Ok(Validation::failed("Invalid data found when processing input"))
        } else {
            Ok(Validation::passed())
        }
    }
}

struct MissingValidator;

impl StreamValidator for MissingValidator {
    fn validate(&self, _path: &Path) -> Result<Validation, ToolError> {
        Err(ToolError::NotInstalled("ffmpeg".to_string()))
    }
}

struct Library {
    dir: TempDir,
    calls: Arc<AtomicUsize>,
}

impl Library {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("music")).unwrap();
        for (name, content) in files {
            fs::write(dir.path().join("music").join(name), content).unwrap();
        }
        Self {
            dir,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn music(&self) -> PathBuf {
        self.dir.path().join("music")
    }

    fn file(&self, name: &str) -> PathBuf {
        fs::canonicalize(self.music()).unwrap().join(name)
    }

    fn files(&self) -> Vec<PathBuf> {
        collect_targets(&self.music(), &WalkerConfig::default()).unwrap()
    }

    fn store(&self) -> Store {
        Store::open(
            StoreOptions::new(self.dir.path().join("db/audiotool.db"))
                .with_backup(false)
                .with_lock_timeout(Duration::from_secs(5)),
        )
        .unwrap()
    }

    fn pipeline(&self) -> IntegrityPipeline {
        IntegrityPipeline::new(Arc::new(CountingValidator {
            calls: Arc::clone(&self.calls),
        }))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn options(phase: &'static str) -> BatchOptions {
    BatchOptions::new(DispatchConfig::new(phase).with_workers(2))
}

fn stored(store: &mut Store, path: &Path) -> IntegrityRecord {
    let key = path.to_string_lossy();
    store
        .list::<IntegrityRecord>()
        .unwrap()
        .into_iter()
        .find(|r| r.path == key)
        .unwrap()
}

#[test]
fn test_check_records_pass_and_fail() {
    let lib = Library::new(&[("good.flac", "fine audio"), ("bad.flac", "corrupt frame")]);
    let mut store = lib.store();

    let report = run_batch(&lib.pipeline(), &mut store, lib.files(), &options("check")).unwrap();

    assert_eq!(report.fresh(), 2);
    assert_eq!(report.persisted, 2);
    assert_eq!(lib.calls(), 2);

    let bad = stored(&mut store, &lib.file("bad.flac"));
    assert_eq!(bad.status, IntegrityStatus::Failed);
    assert!(bad.diagnostic.unwrap().contains("Invalid data"));
    assert_eq!(bad.content_hash.as_deref().map(str::len), Some(64));

    let good = stored(&mut store, &lib.file("good.flac"));
    assert_eq!(good.status, IntegrityStatus::Passed);
    assert_eq!(good.diagnostic, None);
}

#[test]
fn test_second_run_uses_cache() {
    let lib = Library::new(&[("a.flac", "one"), ("b.flac", "two"), ("c.mp3", "three")]);
    let mut store = lib.store();

    run_batch(&lib.pipeline(), &mut store, lib.files(), &options("check")).unwrap();
    assert_eq!(lib.calls(), 3);

    let report = run_batch(&lib.pipeline(), &mut store, lib.files(), &options("check")).unwrap();
    assert_eq!(lib.calls(), 3);
    assert_eq!(report.cached(), 3);
    assert_eq!(report.persisted, 0);
}

#[test]
fn test_recheck_ignores_cache() {
    let lib = Library::new(&[("a.flac", "one"), ("b.flac", "two")]);
    let mut store = lib.store();

    run_batch(&lib.pipeline(), &mut store, lib.files(), &options("check")).unwrap();
    let report = run_batch(
        &lib.pipeline(),
        &mut store,
        lib.files(),
        &options("check").with_force(true),
    )
    .unwrap();

    assert_eq!(lib.calls(), 4);
    assert_eq!(report.fresh(), 2);
    assert!(report
        .outcomes
        .iter()
        .all(|o| matches!(o, Outcome::Fresh { replaced: true, .. })));
}

#[test]
fn test_touched_file_is_refreshed_without_decoding() {
    let lib = Library::new(&[("a.flac", "same content")]);
    let mut store = lib.store();
    run_batch(&lib.pipeline(), &mut store, lib.files(), &options("check")).unwrap();
    let before = stored(&mut store, &lib.file("a.flac"));

    set_file_mtime(lib.file("a.flac"), FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
    let report = run_batch(&lib.pipeline(), &mut store, lib.files(), &options("check")).unwrap();

    assert_eq!(lib.calls(), 1);
    assert_eq!(report.refreshed(), 1);
    assert_eq!(report.persisted, 1);

    let after = stored(&mut store, &lib.file("a.flac"));
    assert_eq!(after.mtime, Some(1_700_000_000.0));
    assert_eq!(after.status, before.status);
    assert_eq!(after.content_hash, before.content_hash);
}

#[test]
fn test_modified_file_is_checked_again() {
    let lib = Library::new(&[("a.flac", "fine audio")]);
    let mut store = lib.store();
    run_batch(&lib.pipeline(), &mut store, lib.files(), &options("check")).unwrap();
    let before = stored(&mut store, &lib.file("a.flac"));

    fs::write(lib.file("a.flac"), "now corrupt").unwrap();
    set_file_mtime(lib.file("a.flac"), FileTime::from_unix_time(1_800_000_000, 0)).unwrap();
    let report = run_batch(&lib.pipeline(), &mut store, lib.files(), &options("check")).unwrap();

    assert_eq!(lib.calls(), 2);
    assert_eq!(report.fresh(), 1);

    let after = stored(&mut store, &lib.file("a.flac"));
    assert_eq!(after.status, IntegrityStatus::Failed);
    assert_eq!(after.mtime, Some(1_800_000_000.0));
    assert_ne!(after.content_hash, before.content_hash);
}

#[test]
fn test_deleted_file_is_cleaned_up() {
    let lib = Library::new(&[("keep.flac", "one"), ("gone.flac", "two")]);
    let mut store = lib.store();
    run_batch(&lib.pipeline(), &mut store, lib.files(), &options("check")).unwrap();
    let gone = lib.file("gone.flac");

    fs::remove_file(&gone).unwrap();
    let report = run_batch(&lib.pipeline(), &mut store, lib.files(), &options("check")).unwrap();

    assert_eq!(report.removed, 1);
    assert_eq!(report.cached(), 1);
    let rows = store.list::<IntegrityRecord>().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].path.ends_with("keep.flac"));
}

#[test]
fn test_vanished_file_is_not_an_error() {
    let lib = Library::new(&[("a.flac", "one"), ("b.flac", "two")]);
    let mut store = lib.store();
    let files = lib.files();
    fs::remove_file(lib.file("b.flac")).unwrap();

    let report = run_batch(&lib.pipeline(), &mut store, files, &options("check")).unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.not_found, vec![lib.file("b.flac")]);
    assert_eq!(report.failed(), 0);
}

#[test]
fn test_validator_errors_are_not_persisted() {
    let lib = Library::new(&[("a.flac", "one")]);
    let mut store = lib.store();
    let pipeline = IntegrityPipeline::new(Arc::new(MissingValidator));

    let report = run_batch(&pipeline, &mut store, lib.files(), &options("check")).unwrap();

    assert_eq!(report.failed(), 1);
    let (path, error) = report.errors().next().unwrap();
    assert_eq!(path, lib.file("a.flac"));
    assert!(error.contains("not installed"));
    assert!(store.list::<IntegrityRecord>().unwrap().is_empty());
}

#[test]
fn test_interrupt_leaves_store_untouched() {
    let lib = Library::new(&[("a.flac", "one"), ("b.flac", "two")]);
    let mut store = lib.store();
    let flag = Arc::new(AtomicBool::new(true));
    let options =
        BatchOptions::new(DispatchConfig::new("check").with_shutdown_flag(Arc::clone(&flag)));

    let err = run_batch(&lib.pipeline(), &mut store, lib.files(), &options).unwrap_err();

    assert!(err.is_interrupted());
    assert_eq!(lib.calls(), 0);
    assert!(store.list::<IntegrityRecord>().unwrap().is_empty());
}

#[test]
fn test_tracker_reports_changes() {
    let lib = Library::new(&[("a.flac", "one"), ("b.flac", "two")]);
    let mut store = lib.store();
    let pipeline = TrackerPipeline::new();

    let first = run_batch(&pipeline, &mut store, lib.files(), &options("track")).unwrap();
    let summary = TrackSummary::from_report(&first);
    assert_eq!((summary.added, summary.updated, summary.unchanged), (2, 0, 0));

    set_file_mtime(lib.file("a.flac"), FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
    fs::write(lib.music().join("c.flac"), "three").unwrap();

    let mut second = run_batch(&pipeline, &mut store, lib.files(), &options("track")).unwrap();
    second.sort_by_path();
    let changes: Vec<_> = second.outcomes.iter().map(TrackChange::of).collect();
    assert_eq!(
        changes,
        vec![
            Some(TrackChange::Updated),
            Some(TrackChange::Unchanged),
            Some(TrackChange::Added)
        ]
    );

    let rows = store.list::<TrackedRecord>().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.mtime.is_some()));
}

struct FixedTags;

impl TagReader for FixedTags {
    fn read(&self, _path: &Path) -> Result<AudioMetadata, ToolError> {
        let tags = TrackTags {
            artist: Some("Artist".to_string()),
            track_number: Some(1),
            ..TrackTags::default()
        };
        let stream = StreamInfo {
            codec: Some("FLAC".to_string()),
            sample_rate: Some(44_100),
            channels: Some(2),
            bit_depth: Some(16),
            bitrate: None,
        };
        Ok(AudioMetadata::new(Container::Flac, stream, tags, Some(1000)))
    }
}

struct UnusedProbe {
    calls: Arc<AtomicUsize>,
}

impl MediaProbe for UnusedProbe {
    fn probe(&self, _path: &Path) -> Result<StreamInfo, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(StreamInfo::default())
    }
}

#[test]
fn test_metadata_is_stored_and_cached() {
    let lib = Library::new(&[("a.flac", "one")]);
    let mut store = lib.store();
    let probes = Arc::new(AtomicUsize::new(0));
    let pipeline = MetadataPipeline::new(
        Arc::new(FixedTags),
        Arc::new(UnusedProbe {
            calls: Arc::clone(&probes),
        }),
    );

    run_batch(&pipeline, &mut store, lib.files(), &options("extract")).unwrap();
    let rows = store.list::<MetadataRecord>().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].metadata.tags.artist.as_deref(), Some("Artist"));
    assert_eq!(rows[0].metadata.stream.sample_rate, Some(44_100));
    assert_eq!(probes.load(Ordering::SeqCst), 0);

    let again = run_batch(&pipeline, &mut store, lib.files(), &options("extract")).unwrap();
    assert_eq!(again.cached(), 1);
    assert_eq!(again.records().next(), rows.first());
}
