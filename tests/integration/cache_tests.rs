use audiotool::cache::{CacheAction, DecisionEngine, Fingerprinted};
use audiotool::scanner::{stat_mtime, Hasher};
use audiotool::store::{timestamp_now, IntegrityRecord, IntegrityStatus, TrackedRecord};
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn checked(path: &Path, hasher: &Hasher) -> IntegrityRecord {
    IntegrityRecord {
        path: path.to_string_lossy().into_owned(),
        content_hash: Some(hasher.hash_file_hex(path).unwrap()),
        mtime: Some(stat_mtime(path).unwrap()),
        status: IntegrityStatus::Passed,
        diagnostic: None,
        last_checked: timestamp_now(),
    }
}

#[test]
fn test_unknown_file_needs_work() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "new.flac", b"audio");
    let engine = DecisionEngine::new(Hasher::new(), false);

    let decision = engine.decide::<IntegrityRecord>(&path, None).unwrap();
    assert_eq!(decision.action, CacheAction::RunFreshCheck);
    assert!(decision.action.needs_work());
    assert_eq!(decision.mtime, Some(stat_mtime(&path).unwrap()));
    assert_eq!(decision.content_hash, None);
}

#[test]
fn test_unchanged_file_is_cached() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "a.flac", b"audio");
    let engine = DecisionEngine::new(Hasher::new(), false);
    let stored = checked(&path, engine.hasher());

    let decision = engine.decide(&path, Some(&stored)).unwrap();
    assert_eq!(decision.action, CacheAction::UseCached);
    assert!(!decision.action.needs_work());
}

#[test]
fn test_force_overrides_cache() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "a.flac", b"audio");
    let engine = DecisionEngine::new(Hasher::new(), true);
    let stored = checked(&path, engine.hasher());

    assert!(engine.force());
    assert_eq!(
        engine.decide(&path, Some(&stored)).unwrap().action,
        CacheAction::RunFreshCheck
    );
}

#[test]
fn test_touched_file_falls_back_to_hash() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "a.flac", b"audio");
    let engine = DecisionEngine::new(Hasher::new(), false);
    let stored = checked(&path, engine.hasher());

    set_file_mtime(&path, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    let decision = engine.decide(&path, Some(&stored)).unwrap();

    assert_eq!(decision.action, CacheAction::UpdateMtimeOnly);
    assert_eq!(decision.mtime, Some(1_600_000_000.0));
    assert_eq!(decision.content_hash, stored.content_hash);

    let refreshed = stored.with_fingerprint(1_600_000_000.0, decision.content_hash);
    assert_eq!(refreshed.mtime, Some(1_600_000_000.0));
    assert_eq!(refreshed.status, stored.status);
}

#[test]
fn test_rewritten_file_needs_work_and_keeps_new_hash() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "a.flac", b"audio");
    let engine = DecisionEngine::new(Hasher::new(), false);
    let stored = checked(&path, engine.hasher());

    fs::write(&path, b"different audio").unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    let decision = engine.decide(&path, Some(&stored)).unwrap();

    assert_eq!(decision.action, CacheAction::RunFreshCheck);
    assert_eq!(
        decision.content_hash,
        Some(engine.hasher().hash_file_hex(&path).unwrap())
    );
}

#[test]
fn test_row_without_hash_is_a_plain_mtime_cache() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "a.flac", b"audio");
    let engine = DecisionEngine::new(Hasher::new(), false);
    let stored = TrackedRecord {
        path: path.to_string_lossy().into_owned(),
        mtime: Some(stat_mtime(&path).unwrap()),
        last_updated: timestamp_now(),
    };
    assert_eq!(
        engine.decide(&path, Some(&stored)).unwrap().action,
        CacheAction::UseCached
    );

    set_file_mtime(&path, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    let decision = engine.decide(&path, Some(&stored)).unwrap();
    assert_eq!(decision.action, CacheAction::RunFreshCheck);
    assert_eq!(decision.content_hash, None);
}

#[test]
fn test_missing_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gone.flac");
    let engine = DecisionEngine::new(Hasher::new(), false);
    let stored = TrackedRecord {
        path: path.to_string_lossy().into_owned(),
        mtime: Some(1.0),
        last_updated: timestamp_now(),
    };

    let decision = engine.decide(&path, Some(&stored)).unwrap();
    assert_eq!(decision.action, CacheAction::FileNotFound);
    assert_eq!(decision.mtime, None);
}

#[test]
fn test_hash_comparison_ignores_case() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "a.flac", b"audio");
    let engine = DecisionEngine::new(Hasher::new(), false);
    let mut stored = checked(&path, engine.hasher());
    stored.content_hash = stored.content_hash.map(|h| h.to_uppercase());
    stored.mtime = Some(1.0);

    assert_eq!(
        engine.decide(&path, Some(&stored)).unwrap().action,
        CacheAction::UpdateMtimeOnly
    );
}
