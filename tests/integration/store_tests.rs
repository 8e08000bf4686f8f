use audiotool::batch::BatchWriter;
use audiotool::dispatch::DispatchConfig;
use audiotool::engine::{
    run_batch, verify_integrity, BatchOptions, IntegrityPipeline, Outcome, VerifyStatus,
};
use audiotool::scanner::Hasher;
use audiotool::store::{
    timestamp_now, IntegrityRecord, IntegrityStatus, Store, StoreError, StoreOptions, Table,
    TrackedRecord,
};
use audiotool::tools::{StreamValidator, ToolError, Validation};
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn options(dir: &TempDir) -> StoreOptions {
    StoreOptions::new(dir.path().join("cache/audiotool.db"))
        .with_backup(false)
        .with_lock_timeout(Duration::from_millis(200))
}

fn tracked(path: &str) -> TrackedRecord {
    TrackedRecord {
        path: path.to_string(),
        mtime: Some(1.0),
        last_updated: timestamp_now(),
    }
}

#[test]
fn test_second_handle_waits_for_lock() {
    let dir = TempDir::new().unwrap();
    let mut first = Store::open(options(&dir)).unwrap();
    let mut second = Store::open(options(&dir)).unwrap();

    let blocked = first
        .with_lock(|_conn| Ok(second.counts()))
        .unwrap();
    match blocked {
        Err(StoreError::Contention { waited, .. }) => {
            assert!(waited >= Duration::from_millis(200));
        }
        other => panic!("expected contention, got {other:?}"),
    }

    // Released once the first critical section ends.
    assert_eq!(second.counts().unwrap().tracked, 0);
}

#[test]
fn test_writer_in_another_thread_waits_for_critical_section() {
    let dir = TempDir::new().unwrap();
    let mut holder = Store::open(options(&dir)).unwrap();
    let mut writer =
        Store::open(options(&dir).with_lock_timeout(Duration::from_secs(5))).unwrap();
    let (entered_tx, entered_rx) = mpsc::channel();

    let (released_at, written_at) = thread::scope(|scope| {
        let a = scope.spawn(move || {
            holder
                .with_lock(|_conn| {
                    entered_tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(400));
                    Ok(Instant::now())
                })
                .unwrap()
        });
        let b = scope.spawn(move || {
            entered_rx.recv().unwrap();
            BatchWriter::new(&mut writer)
                .persist(&[tracked("/m/late.flac")])
                .unwrap();
            Instant::now()
        });
        (a.join().unwrap(), b.join().unwrap())
    });

    assert!(written_at >= released_at);
    let mut reader = Store::open(options(&dir)).unwrap();
    let rows = reader.list::<TrackedRecord>().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].path, "/m/late.flac");
}

#[test]
fn test_writes_are_visible_to_other_handles() {
    let dir = TempDir::new().unwrap();
    let mut writer = Store::open(options(&dir)).unwrap();
    let mut reader = Store::open(options(&dir)).unwrap();

    BatchWriter::new(&mut writer)
        .persist(&[tracked("/m/a.flac"), tracked("/m/b.flac")])
        .unwrap();

    let rows = reader.list::<TrackedRecord>().unwrap();
    assert_eq!(
        rows.iter().map(|r| r.path.as_str()).collect::<Vec<_>>(),
        vec!["/m/a.flac", "/m/b.flac"]
    );
}

#[test]
fn test_contention_is_reported_as_such() {
    let err = StoreError::Contention {
        path: "x.lock".into(),
        waited: Duration::from_secs(1),
    };
    assert!(err.is_contention());
    assert!(err.to_string().contains("held by another process"));
}

#[test]
fn test_clean_covers_every_table() {
    let dir = TempDir::new().unwrap();
    let present = dir.path().join("here.flac");
    fs::write(&present, b"x").unwrap();
    let present = present.to_string_lossy().into_owned();
    let gone = dir.path().join("gone.flac").to_string_lossy().into_owned();

    let mut store = Store::open(options(&dir)).unwrap();
    let mut writer = BatchWriter::new(&mut store);
    writer.persist(&[tracked(&present), tracked(&gone)]).unwrap();
    writer
        .persist(&[IntegrityRecord {
            path: gone,
            content_hash: None,
            mtime: Some(1.0),
            status: IntegrityStatus::Failed,
            diagnostic: Some("broken".to_string()),
            last_checked: timestamp_now(),
        }])
        .unwrap();

    assert_eq!(writer.collect_garbage(&Table::ALL).unwrap(), 2);
    let counts = store.counts().unwrap();
    assert_eq!(counts.tracked, 1);
    assert_eq!(counts.integrity_total(), 0);
}

struct Counting(Arc<AtomicUsize>);

impl StreamValidator for Counting {
    fn validate(&self, _path: &Path) -> Result<Validation, ToolError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(Validation::passed())
    }
}

#[test]
fn test_legacy_md5_rows_get_a_fresh_check() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("old.flac");
    fs::write(&file, b"audio").unwrap();
    let file = fs::canonicalize(&file).unwrap();
    let key = file.to_string_lossy().into_owned();

    let db_path = dir.path().join("cache/audiotool.db");
    fs::create_dir_all(db_path.parent().unwrap()).unwrap();
    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE passed_files (file_path TEXT PRIMARY KEY, file_hash TEXT, mtime REAL, last_checked TEXT);",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO passed_files VALUES (?1, 'd41d8cd98f00b204e9800998ecf8427e', 1.0, '2020-01-01')",
            [&key],
        )
        .unwrap();
    }

    let mut store = Store::open(options(&dir)).unwrap();
    let imported = store.list::<IntegrityRecord>().unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].status, IntegrityStatus::Passed);

    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = IntegrityPipeline::new(Arc::new(Counting(Arc::clone(&calls))));
    let report = run_batch(
        &pipeline,
        &mut store,
        vec![file],
        &BatchOptions::new(DispatchConfig::new("check").with_workers(1)),
    )
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.fresh(), 1);
    let row = &store.list::<IntegrityRecord>().unwrap()[0];
    assert_eq!(row.content_hash.as_deref().map(str::len), Some(64));
}

#[test]
fn test_verify_after_check() {
    let dir = TempDir::new().unwrap();
    let music = dir.path().join("music");
    fs::create_dir_all(&music).unwrap();
    for name in ["a.flac", "b.flac", "c.flac"] {
        fs::write(music.join(name), name).unwrap();
    }
    let files = audiotool::scanner::collect_targets(&music, &Default::default()).unwrap();

    let mut store = Store::open(options(&dir)).unwrap();
    let pipeline = IntegrityPipeline::new(Arc::new(Counting(Arc::new(AtomicUsize::new(0)))));
    run_batch(
        &pipeline,
        &mut store,
        files.clone(),
        &BatchOptions::new(DispatchConfig::new("check").with_workers(2)),
    )
    .unwrap();

    fs::remove_file(&files[1]).unwrap();
    fs::write(&files[2], b"re-encoded").unwrap();
    set_file_mtime(&files[2], FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

    let entries = verify_integrity(&mut store, &Hasher::new()).unwrap();
    let statuses: Vec<VerifyStatus> = entries.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![VerifyStatus::Passed, VerifyStatus::Missing, VerifyStatus::Changed]
    );
    assert_eq!(entries[2].current_mtime, Some(1_700_000_000.0));
    assert_eq!(entries[2].detail.as_deref(), Some("Hash mismatch"));

    // Read-only: the missing row is still there.
    assert_eq!(store.counts().unwrap().integrity_total(), 3);
}

#[test]
fn test_touched_file_is_not_changed_for_verify_or_check() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("a.flac");
    fs::write(&file, b"audio").unwrap();
    let file = fs::canonicalize(&file).unwrap();

    let mut store = Store::open(options(&dir)).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = IntegrityPipeline::new(Arc::new(Counting(Arc::clone(&calls))));
    let options = BatchOptions::new(DispatchConfig::new("check").with_workers(1));
    run_batch(&pipeline, &mut store, vec![file.clone()], &options).unwrap();

    // Same bytes, new mtime.
    set_file_mtime(&file, FileTime::from_unix_time(1_650_000_000, 0)).unwrap();

    let entries = verify_integrity(&mut store, &Hasher::new()).unwrap();
    assert_eq!(entries[0].status, VerifyStatus::Passed);
    assert_eq!(entries[0].current_mtime, Some(1_650_000_000.0));

    let report = run_batch(&pipeline, &mut store, vec![file], &options).unwrap();
    assert!(matches!(report.outcomes[0], Outcome::Refreshed(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let entries = verify_integrity(&mut store, &Hasher::new()).unwrap();
    assert_eq!(entries[0].status, VerifyStatus::Passed);
    assert_eq!(entries[0].stored_mtime, Some(1_650_000_000.0));
}
