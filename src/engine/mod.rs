//! Batch runs: decide, dispatch, persist.
//!
//! # Overview
//!
//! [`run_batch`] drives one command over a list of files:
//!
//! 1. Load the table's index (`path -> row`) under the store lock, once.
//! 2. For each file, let the [`DecisionEngine`] pick a [`CacheAction`].
//!    Cached and mtime-only files are answered immediately; missing files
//!    are excluded; everything else becomes a [`Job`].
//! 3. Run the jobs on the worker pool through the [`Pipeline`].
//! 4. Persist every new or re-stamped row in one [`BatchWriter::persist`].
//! 5. Remove rows of files that no longer exist.
//!
//! Nothing is written if the run is interrupted before step 4.
//!
//! The three pipelines are [`IntegrityPipeline`], [`MetadataPipeline`] and
//! [`TrackerPipeline`]. [`verify_integrity`] is the read-only counterpart
//! used by `db verify`. [`count_library`] and [`analyze_files`] run on the
//! same worker pool but bypass the store.

pub mod analyze;
pub mod count;
pub mod integrity;
pub mod metadata;
pub mod tracker;
pub mod verify;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::batch::BatchWriter;
use crate::cache::{CacheAction, DecisionEngine, Fingerprinted};
use crate::dispatch::{dispatch, DispatchConfig, DispatchError, PathResult, Route};
use crate::scanner::{path_key, Hasher};
use crate::store::{Store, StoreError, StoreRow};

pub use analyze::{analyze_files, AnalysisReport, AnalysisTallies, FileAnalysis, Finding, Severity};
pub use count::{count_library, LibraryCount};
pub use integrity::IntegrityPipeline;
pub use metadata::MetadataPipeline;
pub use tracker::{TrackChange, TrackSummary, TrackerPipeline};
pub use verify::{verify_integrity, verify_record, VerifyEntry, VerifyStatus};

/// The per-file operation behind a command.
pub trait Pipeline: Sync {
    /// Row type produced and stored.
    type Record: StoreRow + Fingerprinted + Send + Sync;

    /// Phase name for progress and logs.
    fn phase(&self) -> &'static str;

    /// Whether rows carry a content hash. When true, workers hash files
    /// that reached them without one.
    fn tracks_content(&self) -> bool;

    /// Do the expensive work for one file.
    ///
    /// # Errors
    ///
    /// A message describing why this file produced no result.
    fn process(&self, job: &Job<Self::Record>) -> Result<Self::Record, String>;
}

/// A file that needs fresh work.
#[derive(Debug, Clone)]
pub struct Job<R> {
    pub path: PathBuf,
    /// mtime observed when the decision was made
    pub mtime: f64,
    pub content_hash: Option<String>,
    /// The row being replaced, if any
    pub previous: Option<R>,
}

impl<R> Job<R> {
    /// Store key for this file.
    #[must_use]
    pub fn key(&self) -> String {
        path_key(&self.path)
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<R> {
    /// Stored row reused unchanged.
    Cached(R),
    /// Stored result kept, row re-stamped with the new mtime.
    Refreshed(R),
    /// New result from a worker.
    Fresh {
        record: R,
        /// Whether a stored row existed before
        replaced: bool,
    },
    /// No result for this file.
    Failed { path: PathBuf, error: String },
}

impl<R: StoreRow> Outcome<R> {
    /// The row, for every outcome except [`Outcome::Failed`].
    #[must_use]
    pub fn record(&self) -> Option<&R> {
        match self {
            Self::Cached(r) | Self::Refreshed(r) | Self::Fresh { record: r, .. } => Some(r),
            Self::Failed { .. } => None,
        }
    }

    /// Whether this outcome changes the store.
    #[must_use]
    pub fn needs_persist(&self) -> bool {
        matches!(self, Self::Refreshed(_) | Self::Fresh { .. })
    }
}

impl<R: StoreRow> PathResult for Outcome<R> {
    fn path(&self) -> &Path {
        match self {
            Self::Failed { path, .. } => path,
            other => other.record().map_or(Path::new(""), |r| Path::new(r.path())),
        }
    }
}

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// `--recheck`
    pub force: bool,
    pub hasher: Hasher,
    pub dispatch: DispatchConfig,
    /// Remove rows of missing files after persisting
    pub collect_garbage: bool,
}

impl BatchOptions {
    #[must_use]
    pub fn new(dispatch: DispatchConfig) -> Self {
        Self {
            force: false,
            hasher: Hasher::new(),
            dispatch,
            collect_garbage: true,
        }
    }

    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = hasher;
        self
    }

    #[must_use]
    pub fn with_garbage_collection(mut self, enabled: bool) -> Self {
        self.collect_garbage = enabled;
        self
    }
}

/// Result of [`run_batch`].
#[derive(Debug)]
pub struct BatchReport<R> {
    /// One entry per file that was not excluded
    pub outcomes: Vec<Outcome<R>>,
    /// Files that vanished before they could be processed
    pub not_found: Vec<PathBuf>,
    /// Rows written by the batch commit
    pub persisted: usize,
    /// Rows removed by cleanup
    pub removed: usize,
    pub duration: Duration,
}

impl<R: StoreRow> BatchReport<R> {
    /// Files with a result (cached, refreshed or fresh).
    pub fn records(&self) -> impl Iterator<Item = &R> {
        self.outcomes.iter().filter_map(Outcome::record)
    }

    /// `(path, message)` for every file without a result.
    pub fn errors(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            Outcome::Failed { path, error } => Some((path.as_path(), error.as_str())),
            _ => None,
        })
    }

    #[must_use]
    pub fn cached(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Cached(_)))
    }

    #[must_use]
    pub fn refreshed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Refreshed(_)))
    }

    #[must_use]
    pub fn fresh(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Fresh { .. }))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&Outcome<R>) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }

    /// Order outcomes by path for stable display and export.
    pub fn sort_by_path(&mut self) {
        self.outcomes.sort_by(|a, b| a.path().cmp(b.path()));
    }
}

/// Errors that abort a batch run.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl EngineError {
    /// Whether the run stopped because of Ctrl+C.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Dispatch(DispatchError::Interrupted))
    }
}

/// Run `pipeline` over `files` against `store`.
///
/// # Errors
///
/// [`EngineError::Store`] on lock contention or database failure,
/// [`EngineError::Dispatch`] if interrupted or the pool cannot start.
/// Per-file failures are reported in the outcomes instead.
pub fn run_batch<P: Pipeline>(
    pipeline: &P,
    store: &mut Store,
    files: Vec<PathBuf>,
    options: &BatchOptions,
) -> Result<BatchReport<P::Record>, EngineError> {
    let started = Instant::now();
    let phase = pipeline.phase();
    log::info!("{}: {} files", phase, files.len());

    let index = store.load_index::<P::Record>()?;
    let engine = DecisionEngine::new(options.hasher.clone(), options.force);
    let mut not_found = Vec::new();

    let decide = |path: PathBuf| -> Route<Job<P::Record>, Outcome<P::Record>> {
        let stored = index.get(&path_key(&path));
        let decision = match engine.decide(&path, stored) {
            Ok(decision) => decision,
            Err(e) => {
                log::warn!("{}", e);
                return Route::Skip(Outcome::Failed {
                    path,
                    error: e.to_string(),
                });
            }
        };

        match (decision.action, stored, decision.mtime) {
            (CacheAction::FileNotFound, _, _) | (_, _, None) => {
                not_found.push(path);
                Route::Excluded
            }
            (CacheAction::UseCached, Some(row), _) => Route::Skip(Outcome::Cached(row.clone())),
            (CacheAction::UpdateMtimeOnly, Some(row), Some(mtime)) => Route::Skip(
                Outcome::Refreshed(row.with_fingerprint(mtime, decision.content_hash)),
            ),
            (_, stored, Some(mtime)) => Route::Work(Job {
                path,
                mtime,
                content_hash: decision.content_hash,
                previous: stored.cloned(),
            }),
        }
    };

    let hasher = &options.hasher;
    let work = |mut job: Job<P::Record>| -> Outcome<P::Record> {
        if pipeline.tracks_content() && job.content_hash.is_none() {
            match hasher.hash_file_hex(&job.path) {
                Ok(hash) => job.content_hash = Some(hash),
                Err(e) => {
                    log::debug!("{}", e);
                    return Outcome::Failed {
                        path: job.path,
                        error: e.to_string(),
                    };
                }
            }
        }
        match pipeline.process(&job) {
            Ok(record) => Outcome::Fresh {
                record,
                replaced: job.previous.is_some(),
            },
            Err(error) => {
                log::debug!("{}: {}", job.path.display(), error);
                Outcome::Failed {
                    path: job.path,
                    error,
                }
            }
        }
    };

    let report = dispatch(files, decide, work, &options.dispatch)?;

    let rows: Vec<P::Record> = report
        .results
        .iter()
        .filter(|o| o.needs_persist())
        .filter_map(Outcome::record)
        .cloned()
        .collect();

    let mut writer = BatchWriter::new(store);
    let persisted = writer.persist(&rows)?;
    let removed = if options.collect_garbage {
        writer.collect_garbage(&[P::Record::TABLE])?
    } else {
        0
    };

    let duration = started.elapsed();
    log::info!(
        "{}: {} cached, {} refreshed, {} processed, {} failed, {} missing in {:.2?}",
        phase,
        report.skipped,
        report.results.iter().filter(|o| matches!(o, Outcome::Refreshed(_))).count(),
        report.dispatched,
        report.results.iter().filter(|o| matches!(o, Outcome::Failed { .. })).count(),
        not_found.len(),
        duration
    );

    Ok(BatchReport {
        outcomes: report.results,
        not_found,
        persisted,
        removed,
        duration,
    })
}
