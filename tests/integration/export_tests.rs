use audiotool::engine::{BatchReport, Outcome};
use audiotool::output::{write_export, CheckSummary, ExportFormat, IntegrityRow};
use audiotool::store::{timestamp_now, IntegrityRecord, IntegrityStatus};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn report() -> BatchReport<IntegrityRecord> {
    let record = |path: &str, status, diagnostic: Option<&str>| IntegrityRecord {
        path: path.to_string(),
        content_hash: Some("ab".repeat(32)),
        mtime: Some(1_700_000_000.5),
        status,
        diagnostic: diagnostic.map(str::to_string),
        last_checked: timestamp_now(),
    };
    BatchReport {
        outcomes: vec![
            Outcome::Cached(record("/m/a.flac", IntegrityStatus::Passed, None)),
            Outcome::Fresh {
                record: record("/m/b.flac", IntegrityStatus::Failed, Some("bad, \"frame\"")),
                replaced: true,
            },
            Outcome::Failed {
                path: PathBuf::from("/m/c.flac"),
                error: "ffmpeg is not installed or not on PATH".to_string(),
            },
        ],
        not_found: vec![PathBuf::from("/m/d.flac")],
        persisted: 1,
        removed: 0,
        duration: Duration::from_millis(1500),
    }
}

fn rows(report: &BatchReport<IntegrityRecord>) -> Vec<IntegrityRow> {
    report.outcomes.iter().map(IntegrityRow::from_outcome).collect()
}

#[test]
fn test_json_export_has_summary_and_results() {
    let dir = TempDir::new().unwrap();
    let report = report();
    let summary = CheckSummary::from_report(&report);

    let path = write_export(dir.path(), "integrity", ExportFormat::Json, &summary, &rows(&report))
        .unwrap();

    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("integrity_export_"));
    assert!(name.ends_with(".json"));

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["summary"]["total"], 3);
    assert_eq!(value["summary"]["passed"], 1);
    assert_eq!(value["summary"]["failed"], 1);
    assert_eq!(value["summary"]["errors"], 1);
    assert_eq!(value["summary"]["not_found"], 1);
    assert_eq!(value["summary"]["duration_ms"], 1500);

    let results = value["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[1]["status"], "FAILED");
    assert_eq!(results[2]["status"], "ERROR");
    assert!(results[2]["diagnostic"].as_str().unwrap().contains("not installed"));
}

#[test]
fn test_csv_export_has_one_row_per_file() {
    let dir = TempDir::new().unwrap();
    let report = report();
    let summary = CheckSummary::from_report(&report);

    let path = write_export(dir.path(), "integrity", ExportFormat::Csv, &summary, &rows(&report))
        .unwrap();
    assert_eq!(path.extension().unwrap(), "csv");

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "path");
    assert_eq!(&headers[1], "status");

    let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(records.len(), 3);
    assert_eq!(&records[0][1], "PASSED");
    assert_eq!(&records[1][2], "bad, \"frame\"");
    assert_eq!(&records[2][1], "ERROR");
}

#[test]
fn test_exports_do_not_overwrite_other_kinds() {
    let dir = TempDir::new().unwrap();
    let report = report();
    let summary = CheckSummary::from_report(&report);

    let a = write_export(dir.path(), "integrity", ExportFormat::Json, &summary, &rows(&report))
        .unwrap();
    let b = write_export(dir.path(), "verify", ExportFormat::Json, &summary, &rows(&report))
        .unwrap();

    assert_ne!(a, b);
    assert!(a.exists() && b.exists());
}
