//! Bounded parallel work dispatch.
//!
//! # Overview
//!
//! [`dispatch`] takes a list of items and two closures:
//!
//! 1. `decide` runs on the calling thread, once per item, in input order,
//!    and routes the item with a [`Route`]: a ready result, exclusion, or a
//!    job for the pool.
//! 2. `work` runs on a fixed-size rayon pool for every [`Route::Work`] job.
//!
//! Worker results come back over a channel in completion order; each one
//! carries its own path, so ordering does not matter to the caller. The
//! progress callback sees every item (skips included) exactly once.
//!
//! A raised shutdown flag stops the decision loop and makes idle workers
//! drop their remaining jobs. The dispatch then returns
//! [`DispatchError::Interrupted`] and no partial results.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::progress::ProgressCallback;

/// Result types that know which file they belong to.
pub trait PathResult {
    fn path(&self) -> &Path;
}

/// How `decide` routes one item.
#[derive(Debug)]
pub enum Route<J, T> {
    /// Already answered; no work needed.
    Skip(T),
    /// Dropped from the batch entirely (e.g. the file vanished).
    Excluded,
    /// Needs a worker.
    Work(J),
}

/// Dispatcher settings.
#[derive(Clone)]
pub struct DispatchConfig {
    /// Pool size; 0 uses one thread per CPU.
    pub workers: usize,
    /// Optional shutdown flag
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
    /// Phase name reported to the callback
    pub phase: &'static str,
}

impl std::fmt::Debug for DispatchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchConfig")
            .field("workers", &self.workers)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .field("phase", &self.phase)
            .finish()
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            shutdown_flag: None,
            progress_callback: None,
            phase: "work",
        }
    }
}

impl DispatchConfig {
    #[must_use]
    pub fn new(phase: &'static str) -> Self {
        Self {
            phase,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Everything a dispatch produced.
#[derive(Debug)]
pub struct DispatchReport<T> {
    /// Skip results in input order, then worker results in completion order
    pub results: Vec<T>,
    /// Items answered without a worker
    pub skipped: usize,
    /// Items dropped by `decide`
    pub excluded: usize,
    /// Items sent to the pool
    pub dispatched: usize,
    /// Wall-clock time of the whole dispatch
    pub duration: Duration,
}

/// Errors that abort a dispatch.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    /// Shutdown was requested.
    #[error("Interrupted by user")]
    Interrupted,

    /// The worker pool could not be created.
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(String),
}

/// Route every item, run the jobs on the pool and collect the results.
///
/// # Errors
///
/// [`DispatchError::Interrupted`] if shutdown is requested at any point,
/// [`DispatchError::ThreadPool`] if the pool cannot be built.
pub fn dispatch<I, J, T, D, W>(
    items: Vec<I>,
    mut decide: D,
    work: W,
    config: &DispatchConfig,
) -> Result<DispatchReport<T>, DispatchError>
where
    D: FnMut(I) -> Route<J, T>,
    W: Fn(J) -> T + Sync,
    J: Send,
    T: PathResult + Send,
{
    let started = Instant::now();
    let total = items.len();
    let callback = config.progress_callback.clone();
    if let Some(ref cb) = callback {
        cb.on_phase_start(config.phase, total);
    }

    let mut results = Vec::with_capacity(total);
    let mut jobs = Vec::new();
    let mut excluded = 0usize;
    let mut completed = 0usize;

    for item in items {
        if config.is_shutdown_requested() {
            log::info!("{}: interrupted while deciding", config.phase);
            return Err(DispatchError::Interrupted);
        }
        match decide(item) {
            Route::Skip(result) => {
                completed += 1;
                if let Some(ref cb) = callback {
                    cb.on_progress(completed, &result.path().to_string_lossy());
                }
                results.push(result);
            }
            Route::Excluded => {
                excluded += 1;
                completed += 1;
                if let Some(ref cb) = callback {
                    cb.on_progress(completed, "");
                }
            }
            Route::Work(job) => jobs.push(job),
        }
    }

    let skipped = results.len();
    let dispatched = jobs.len();
    log::info!(
        "{}: {} cached, {} excluded, {} to process",
        config.phase,
        skipped,
        excluded,
        dispatched
    );

    if !jobs.is_empty() {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("audiotool-worker-{i}"))
            .build()
            .map_err(|e| DispatchError::ThreadPool(e.to_string()))?;
        log::debug!(
            "{}: running {} jobs on {} threads",
            config.phase,
            dispatched,
            pool.current_num_threads()
        );

        let (tx, rx) = mpsc::channel::<T>();
        let work = &work;
        let shutdown = config.shutdown_flag.clone();

        std::thread::scope(|scope| {
            scope.spawn(move || {
                pool.install(|| {
                    jobs.into_par_iter().for_each_with(tx, |tx, job| {
                        if shutdown.as_ref().is_some_and(|f| f.load(Ordering::SeqCst)) {
                            return;
                        }
                        // The receiver only goes away if the main thread unwound.
                        let _ = tx.send(work(job));
                    });
                });
            });

            for result in rx {
                completed += 1;
                if let Some(ref cb) = callback {
                    cb.on_progress(completed, &result.path().to_string_lossy());
                }
                results.push(result);
            }
        });
    }

    if let Some(ref cb) = callback {
        cb.on_phase_end(config.phase);
    }

    if config.is_shutdown_requested() {
        log::info!("{}: interrupted, discarding {} results", config.phase, results.len());
        return Err(DispatchError::Interrupted);
    }

    Ok(DispatchReport {
        results,
        skipped,
        excluded,
        dispatched,
        duration: started.elapsed(),
    })
}
