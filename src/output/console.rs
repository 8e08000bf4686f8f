//! Human-readable summaries on stdout.
//!
//! Coloring goes through `yansi`; [`init_color`] turns it off for
//! `--no-color` or when stdout is not a terminal.

use std::fmt::Write as _;
use std::path::Path;

use yansi::{Color, Paint};

use super::report::{AnalysisSummary, CheckSummary, MetadataSummary, VerifySummary};
use crate::batch::StoreIssue;
use crate::engine::analyze::{channel_layout, TallyEntry};
use crate::engine::{
    AnalysisReport, BatchReport, LibraryCount, Outcome, Severity, TrackChange, TrackSummary,
    VerifyEntry, VerifyStatus,
};
use crate::store::{IntegrityRecord, IntegrityStatus, MetadataRecord, StoreCounts, TrackedRecord};

/// Enable color only on a terminal and when not disabled.
pub fn init_color(no_color: bool) {
    if no_color {
        yansi::disable();
    } else {
        yansi::whenever(yansi::Condition::TTY_AND_COLOR);
    }
}

fn status_color(status: &str) -> Color {
    match status {
        "PASSED" => Color::Green,
        "FAILED" | "ERROR" => Color::Red,
        _ => Color::Yellow,
    }
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{}", title.bold());
}

fn count(out: &mut String, label: &str, value: usize, color: Color) {
    let shown = if value > 0 {
        value.to_string().fg(color).to_string()
    } else {
        value.to_string()
    };
    let _ = writeln!(out, "  {:<14} {}", format!("{label}:"), shown);
}

fn errors<'a>(out: &mut String, errors: impl Iterator<Item = (&'a Path, &'a str)>) {
    let mut first = true;
    for (path, error) in errors {
        if first {
            let _ = writeln!(out, "\n{}", "Errors:".red().bold());
            first = false;
        }
        let _ = writeln!(out, "  {}: {}", path.display(), error);
    }
}

/// Summary of an integrity check. Errors are always listed; `verbose`
/// also lists every file with its status and diagnostic.
#[must_use]
pub fn render_check(
    summary: &CheckSummary,
    report: &BatchReport<IntegrityRecord>,
    verbose: bool,
) -> String {
    let mut out = String::new();

    if verbose {
        heading(&mut out, "Results");
        for record in report.records() {
            let status = record.status.as_str();
            let _ = writeln!(out, "  [{}] {}", status.fg(status_color(status)), record.path);
            if record.status == IntegrityStatus::Failed {
                if let Some(ref diagnostic) = record.diagnostic {
                    for line in diagnostic.lines() {
                        let _ = writeln!(out, "      {}", line.dim());
                    }
                }
            }
        }
    }

    heading(&mut out, "Integrity check");
    count(&mut out, "Total", summary.total, Color::Primary);
    count(&mut out, "Passed", summary.passed, Color::Green);
    count(&mut out, "Failed", summary.failed, Color::Red);
    count(&mut out, "Errors", summary.errors, Color::Red);
    let _ = writeln!(
        out,
        "  {}",
        format!(
            "{} cached, {} refreshed, {} checked in {:.1}s",
            summary.cached,
            summary.refreshed,
            summary.checked,
            summary.duration_ms as f64 / 1000.0
        )
        .dim()
    );
    if summary.not_found > 0 {
        count(&mut out, "Vanished", summary.not_found, Color::Yellow);
    }
    if summary.removed > 0 {
        count(&mut out, "Cleaned up", summary.removed, Color::Yellow);
    }

    if !verbose && summary.failed > 0 {
        heading(&mut out, "Failed files");
        for record in report
            .records()
            .filter(|r| r.status == IntegrityStatus::Failed)
        {
            let _ = writeln!(out, "  {}", record.path);
        }
    }
    errors(&mut out, report.errors());
    out
}

/// Summary of a metadata run; `verbose` prints each file's fields and
/// `summary_only` drops everything but the counts.
#[must_use]
pub fn render_metadata(
    summary: &MetadataSummary,
    report: &BatchReport<MetadataRecord>,
    verbose: bool,
    summary_only: bool,
) -> String {
    let mut out = String::new();

    if verbose && !summary_only {
        heading(&mut out, "Results");
        for record in report.records() {
            let m = &record.metadata;
            let _ = writeln!(out, "  {}", record.path.as_str().bold());
            let field = |out: &mut String, name: &str, value: Option<String>| {
                if let Some(value) = value {
                    let _ = writeln!(out, "      {:<13} {}", format!("{name}:"), value);
                }
            };
            field(&mut out, "container", Some(m.container.to_string()));
            field(&mut out, "codec", m.stream.codec.clone());
            field(&mut out, "sample rate", m.stream.sample_rate.map(|v| format!("{v} Hz")));
            field(&mut out, "bit depth", m.stream.bit_depth.map(|v| v.to_string()));
            field(&mut out, "channels", m.stream.channels.map(|v| v.to_string()));
            field(&mut out, "bitrate", m.stream.bitrate.map(|v| format!("{} kbps", v / 1000)));
            field(&mut out, "duration", m.duration_ms.map(format_duration));
            field(&mut out, "artist", m.tags.artist.clone());
            field(&mut out, "album", m.tags.album.clone());
            field(&mut out, "album artist", m.tags.album_artist.clone());
            field(&mut out, "title", m.tags.title.clone());
            field(
                &mut out,
                "track",
                m.tags.track_number.map(|n| pair(n, m.tags.track_total)),
            );
            field(
                &mut out,
                "disc",
                m.tags.disc_number.map(|n| pair(n, m.tags.disc_total)),
            );
            field(&mut out, "date", m.tags.date.clone());
            field(&mut out, "isrc", m.tags.isrc.clone());
            field(&mut out, "upc", m.tags.upc.clone());
        }
    }

    heading(&mut out, "Metadata");
    count(&mut out, "Total", summary.total, Color::Primary);
    count(&mut out, "Extracted", summary.extracted, Color::Green);
    count(&mut out, "Cached", summary.cached, Color::Primary);
    count(&mut out, "Errors", summary.errors, Color::Red);
    if summary.not_found > 0 {
        count(&mut out, "Vanished", summary.not_found, Color::Yellow);
    }
    if summary.removed > 0 {
        count(&mut out, "Cleaned up", summary.removed, Color::Yellow);
    }
    if !summary_only {
        errors(&mut out, report.errors());
    }
    out
}

/// Summary of a tracker run; `verbose` lists added and updated files.
#[must_use]
pub fn render_track(
    summary: &TrackSummary,
    report: &BatchReport<TrackedRecord>,
    verbose: bool,
) -> String {
    let mut out = String::new();

    if verbose {
        heading(&mut out, "Changes");
        for outcome in &report.outcomes {
            let (label, color) = match TrackChange::of(outcome) {
                Some(TrackChange::Added) => ("added", Color::Green),
                Some(TrackChange::Updated) => ("updated", Color::Yellow),
                _ => continue,
            };
            if let Some(record) = outcome.record() {
                let _ = writeln!(out, "  [{}] {}", label.fg(color), record.path);
            }
        }
    }

    heading(&mut out, "Tracker");
    count(&mut out, "Total", summary.total, Color::Primary);
    count(&mut out, "Added", summary.added, Color::Green);
    count(&mut out, "Updated", summary.updated, Color::Yellow);
    count(&mut out, "Unchanged", summary.unchanged, Color::Primary);
    count(&mut out, "Errors", summary.errors, Color::Red);
    count(&mut out, "Removed", summary.removed, Color::Yellow);
    errors(
        &mut out,
        report.outcomes.iter().filter_map(|o| match o {
            Outcome::Failed { path, error } => Some((path.as_path(), error.as_str())),
            _ => None,
        }),
    );
    out
}

/// `db verify` listing. Problems are always listed; `verbose` lists all.
#[must_use]
pub fn render_verify(summary: &VerifySummary, entries: &[VerifyEntry], verbose: bool) -> String {
    let mut out = String::new();

    let shown: Vec<&VerifyEntry> = entries
        .iter()
        .filter(|e| verbose || e.status.is_problem())
        .collect();
    if !shown.is_empty() {
        heading(&mut out, "Entries");
        for entry in shown {
            let status = entry.status.as_str();
            let _ = writeln!(out, "  [{}] {}", status.fg(status_color(status)), entry.path);
            if let (VerifyStatus::Failed | VerifyStatus::Error, Some(detail)) =
                (entry.status, entry.detail.as_deref())
            {
                let _ = writeln!(out, "      {}", detail.lines().next().unwrap_or("").dim());
            }
        }
    }

    heading(&mut out, "Verification");
    count(&mut out, "Total", summary.total, Color::Primary);
    count(&mut out, "Passed", summary.passed, Color::Green);
    count(&mut out, "Failed", summary.failed, Color::Red);
    count(&mut out, "Missing", summary.missing, Color::Yellow);
    count(&mut out, "Changed", summary.changed, Color::Yellow);
    count(&mut out, "Errors", summary.errors, Color::Red);
    out
}

/// `db stats`
#[must_use]
pub fn render_stats(path: &Path, counts: &StoreCounts) -> String {
    let mut out = String::new();
    heading(&mut out, &format!("Store {}", path.display()));
    let _ = writeln!(out, "  {}", "integrity_results".bold());
    count(&mut out, "Passed", counts.integrity_passed, Color::Green);
    count(&mut out, "Failed", counts.integrity_failed, Color::Red);
    count(&mut out, "Total", counts.integrity_total(), Color::Primary);
    let _ = writeln!(out, "  {}", "audio_metadata".bold());
    count(&mut out, "Rows", counts.metadata, Color::Primary);
    let _ = writeln!(out, "  {}", "tracked_files".bold());
    count(&mut out, "Rows", counts.tracked, Color::Primary);
    out
}

/// `count`: albums with their track counts, then songs and size per codec.
/// `verbose` also lists every album's files.
#[must_use]
pub fn render_count(library: &LibraryCount, verbose: bool) -> String {
    let mut out = String::new();

    heading(&mut out, "Albums");
    for album in &library.albums {
        let _ = writeln!(
            out,
            "  {} - {}: {} tracks",
            album.artist,
            album.album.as_str().bold(),
            album.tracks.len()
        );
        if verbose {
            for track in &album.tracks {
                let _ = writeln!(out, "      {}", track.display().dim());
            }
        }
    }

    heading(&mut out, "Codecs");
    for (codec, tally) in &library.codecs {
        let _ = writeln!(
            out,
            "  {:<14} {} songs, {}",
            format!("{codec}:"),
            tally.songs,
            format_size(tally.bytes)
        );
    }

    heading(&mut out, "Library");
    count(&mut out, "Albums", library.albums.len(), Color::Primary);
    count(&mut out, "Songs", library.songs(), Color::Primary);
    let _ = writeln!(out, "  {:<14} {}", "Size:", format_size(library.total_bytes()));
    count(&mut out, "Errors", library.errors.len(), Color::Red);
    errors(
        &mut out,
        library.errors.iter().map(|(path, e)| (path.as_path(), e.as_str())),
    );
    out
}

/// `analyze`: files with warnings (or every file with `verbose`), then
/// the tallies.
#[must_use]
pub fn render_analysis(
    summary: &AnalysisSummary,
    report: &AnalysisReport,
    verbose: bool,
) -> String {
    let mut out = String::new();

    let shown: Vec<_> = report
        .files
        .iter()
        .filter(|f| f.stream.is_ok() && (verbose || f.has_warnings()))
        .collect();
    if !shown.is_empty() {
        heading(&mut out, if verbose { "Files" } else { "Flagged files" });
    }
    for file in shown {
        let _ = writeln!(out, "  {}", file.path.display().bold());
        if let Ok(ref s) = file.stream {
            let na = || "N/A".to_string();
            let _ = writeln!(
                out,
                "      Bitrate: {}",
                s.bitrate.map_or_else(na, |b| format!("{b} bps"))
            );
            let _ = writeln!(
                out,
                "      Sample rate: {}",
                s.sample_rate.map_or_else(na, |r| format!("{r} Hz"))
            );
            let _ = writeln!(
                out,
                "      Bit depth: {}",
                s.bit_depth.map_or_else(na, |d| format!("{d} bits"))
            );
            let _ = writeln!(out, "      Channels: {}", s.channels.map_or_else(na, channel_layout));
            let _ = writeln!(out, "      Codec: {}", s.codec.clone().unwrap_or_else(na));
        }
        for finding in &file.findings {
            let color = match finding.severity {
                Severity::Info => Color::Cyan,
                Severity::Warning => Color::Yellow,
            };
            let _ = writeln!(
                out,
                "      [{}] {}",
                finding.severity.as_str().fg(color),
                finding.message
            );
        }
    }

    let tallies = &summary.tallies;
    for (title, entries) in [
        ("Formats", &tallies.formats),
        ("Sample rates", &tallies.sample_rates),
        ("Bit depths", &tallies.bit_depths),
        ("Channels", &tallies.channels),
    ] {
        tally_block(&mut out, title, entries);
    }

    heading(&mut out, "Analysis");
    count(&mut out, "Total", summary.total, Color::Primary);
    count(&mut out, "Analyzed", summary.analyzed, Color::Green);
    count(&mut out, "Flagged", summary.flagged, Color::Yellow);
    count(&mut out, "Errors", summary.errors, Color::Red);
    errors(
        &mut out,
        report.files.iter().filter_map(|f| match f.stream {
            Err(ref e) => Some((f.path.as_path(), e.as_str())),
            Ok(_) => None,
        }),
    );
    out
}

fn tally_block(out: &mut String, title: &str, entries: &[TallyEntry]) {
    if entries.is_empty() {
        return;
    }
    heading(out, title);
    for entry in entries {
        let _ = writeln!(out, "  {:<14} {}", format!("{}:", entry.label), entry.files);
    }
}

/// `db check`. Counts per kind; `verbose` lists every issue.
#[must_use]
pub fn render_issues(issues: &[StoreIssue], verbose: bool) -> String {
    let mut out = String::new();

    if verbose && !issues.is_empty() {
        heading(&mut out, "Issues");
        for issue in issues {
            let _ = writeln!(out, "  {issue}");
        }
    }

    let kind = |f: fn(&StoreIssue) -> bool| issues.iter().filter(|i| f(i)).count();
    heading(&mut out, "Store check");
    count(
        &mut out,
        "Schema",
        kind(|i| matches!(i, StoreIssue::SchemaMismatch { .. })),
        Color::Red,
    );
    count(
        &mut out,
        "Missing files",
        kind(|i| matches!(i, StoreIssue::MissingFile { .. })),
        Color::Yellow,
    );
    count(
        &mut out,
        "Sample rates",
        kind(|i| matches!(i, StoreIssue::InvalidSampleRate { .. })),
        Color::Yellow,
    );
    count(
        &mut out,
        "Bitrates",
        kind(|i| matches!(i, StoreIssue::InvalidBitrate { .. })),
        Color::Yellow,
    );
    if issues.is_empty() {
        let _ = writeln!(out, "  {}", "No issues found".green());
    } else {
        let _ = writeln!(
            out,
            "  {}",
            format!("{} issues; `db repair` fixes all but schema drift", issues.len()).dim()
        );
    }
    out
}

/// Megabytes, or gigabytes past 1024 MB.
fn format_size(bytes: u64) -> String {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    if mb > 1024.0 {
        format!("{:.2} GB", mb / 1024.0)
    } else {
        format!("{mb:.2} MB")
    }
}

fn pair(number: u32, total: Option<u32>) -> String {
    match total {
        Some(total) => format!("{number}/{total}"),
        None => number.to_string(),
    }
}

fn format_duration(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}
