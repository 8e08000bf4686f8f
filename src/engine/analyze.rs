//! Per-file stream analysis with quality warnings.
//!
//! Probes every file with the [`MediaProbe`] on the worker pool and flags
//! lossy codecs, low bit depths and low sample rates. Nothing is cached.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::dispatch::{dispatch, DispatchConfig, DispatchError, PathResult, Route};
use crate::media::StreamInfo;
use crate::tools::MediaProbe;

/// Bit depths below this are flagged.
pub const MIN_BIT_DEPTH: u32 = 16;
/// Sample rates below this (Hz) are flagged.
pub const MIN_SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

/// One observation about a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity.as_str(), self.message)
    }
}

/// Judge a probed stream.
///
/// The extension decides which codec notes apply: `.m4a` names the codec
/// inside, `.mp3` and `.opus` are always lossy.
#[must_use]
pub fn assess(path: &Path, stream: &StreamInfo) -> Vec<Finding> {
    let mut findings = Vec::new();
    let codec = stream.codec.as_deref().unwrap_or("N/A");
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("m4a") => {
            let lower = codec.to_ascii_lowercase();
            if lower.contains("aac") {
                findings.push(Finding::info("AAC (lossy) codec detected"));
            } else if lower.contains("alac") {
                findings.push(Finding::info("ALAC (lossless) codec detected"));
            } else {
                findings.push(Finding::warning(format!("Unknown codec: {codec}")));
            }
        }
        Some("mp3" | "opus") => findings.push(Finding::info(format!("Lossy codec: {codec}"))),
        _ => {}
    }

    if let Some(depth) = stream.bit_depth.filter(|&d| d < MIN_BIT_DEPTH) {
        findings.push(Finding::warning(format!(
            "Low bit depth ({depth} bits) may indicate lossy encoding"
        )));
    }
    if let Some(rate) = stream.sample_rate.filter(|&r| r < MIN_SAMPLE_RATE) {
        findings.push(Finding::warning(format!(
            "Low sample rate ({rate} Hz) may indicate lossy encoding"
        )));
    }
    findings
}

/// `Mono`, `Stereo` or `N channels`.
#[must_use]
pub fn channel_layout(channels: u32) -> String {
    match channels {
        1 => "Mono".to_string(),
        2 => "Stereo".to_string(),
        n => format!("{n} channels"),
    }
}

/// Analysis of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAnalysis {
    pub path: PathBuf,
    /// Probe result or its error message
    pub stream: Result<StreamInfo, String>,
    pub findings: Vec<Finding>,
}

impl FileAnalysis {
    #[must_use]
    pub fn new(path: PathBuf, stream: Result<StreamInfo, String>) -> Self {
        let findings = match stream {
            Ok(ref info) => assess(&path, info),
            Err(_) => Vec::new(),
        };
        Self {
            path,
            stream,
            findings,
        }
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Warning)
    }
}

impl PathResult for FileAnalysis {
    fn path(&self) -> &Path {
        &self.path
    }
}

/// One tally line, e.g. `44100 Hz: 12`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TallyEntry {
    pub label: String,
    pub files: usize,
}

/// How many probed files share each format, sample rate, bit depth and
/// channel layout. Unknown values are counted under `N/A`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisTallies {
    pub formats: Vec<TallyEntry>,
    pub sample_rates: Vec<TallyEntry>,
    pub bit_depths: Vec<TallyEntry>,
    pub channels: Vec<TallyEntry>,
}

fn tally<K: Ord>(
    streams: &[&StreamInfo],
    key: impl Fn(&StreamInfo) -> Option<K>,
    label: impl Fn(&K) -> String,
) -> Vec<TallyEntry> {
    let mut counts: BTreeMap<Option<K>, usize> = BTreeMap::new();
    for &stream in streams {
        *counts.entry(key(stream)).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(k, files)| TallyEntry {
            label: k.as_ref().map_or_else(|| "N/A".to_string(), &label),
            files,
        })
        .collect()
}

/// Everything an analysis run produced, in path order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisReport {
    pub files: Vec<FileAnalysis>,
    pub duration: Duration,
}

impl AnalysisReport {
    /// Files the probe could read.
    #[must_use]
    pub fn analyzed(&self) -> usize {
        self.files.iter().filter(|f| f.stream.is_ok()).count()
    }

    #[must_use]
    pub fn errors(&self) -> usize {
        self.files.len() - self.analyzed()
    }

    /// Files with at least one warning.
    #[must_use]
    pub fn flagged(&self) -> usize {
        self.files.iter().filter(|f| f.has_warnings()).count()
    }

    #[must_use]
    pub fn tallies(&self) -> AnalysisTallies {
        let streams: Vec<&StreamInfo> = self
            .files
            .iter()
            .filter_map(|f| f.stream.as_ref().ok())
            .collect();
        AnalysisTallies {
            formats: tally(&streams, |s| s.codec.clone(), String::clone),
            sample_rates: tally(&streams, |s| s.sample_rate, |r| format!("{r} Hz")),
            bit_depths: tally(&streams, |s| s.bit_depth, |d| format!("{d} bits")),
            channels: tally(&streams, |s| s.channels, |&c| channel_layout(c)),
        }
    }
}

/// Probe every file and assess the results.
///
/// # Errors
///
/// [`DispatchError`] if interrupted or the pool cannot start. Probe
/// failures are per-file results.
pub fn analyze_files(
    probe: &dyn MediaProbe,
    files: Vec<PathBuf>,
    config: &DispatchConfig,
) -> Result<AnalysisReport, DispatchError> {
    let started = Instant::now();
    log::info!("{}: {} files", config.phase, files.len());

    let work = |path: PathBuf| -> FileAnalysis {
        let stream = probe.probe(&path).map_err(|e| {
            log::debug!("{}: {}", path.display(), e);
            e.to_string()
        });
        FileAnalysis::new(path, stream)
    };
    let report = dispatch(files, Route::<PathBuf, FileAnalysis>::Work, work, config)?;

    let mut files = report.results;
    files.sort_by(|a, b| a.path.cmp(&b.path));
    let report = AnalysisReport {
        files,
        duration: started.elapsed(),
    };
    log::info!(
        "{}: {} analyzed, {} flagged, {} failed in {:.2?}",
        config.phase,
        report.analyzed(),
        report.flagged(),
        report.errors(),
        report.duration
    );
    Ok(report)
}
