//! Application entry: wires configuration, store, tools and reporting
//! together for each subcommand.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::batch::{inspect, BatchWriter};
use crate::cli::{
    AnalyzeArgs, BatchArgs, Cli, Commands, CountArgs, DbCommand, MetadataArgs, TrackArgs,
    VerifyArgs, VerifyFilter,
};
use crate::config::Config;
use crate::dispatch::{DispatchConfig, DispatchError};
use crate::engine::{
    analyze_files, count_library, run_batch, verify_integrity, BatchOptions, BatchReport,
    EngineError, IntegrityPipeline, MetadataPipeline, Pipeline, TrackSummary, TrackerPipeline,
    VerifyEntry,
};
use crate::error::ExitCode;
use crate::logging::init_logging;
use crate::output::{
    self, console, AnalysisRow, AnalysisSummary, CheckSummary, ExportFormat, IntegrityRow,
    MetadataRow, MetadataSummary, VerifyRow, VerifySummary,
};
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::{collect_targets, Hasher, WalkerConfig};
use crate::signal::{install_handler, ShutdownHandler};
use crate::store::{Store, Table};
use crate::tools::{FfmpegValidator, FfprobeProbe, LoftyTagReader};

/// Everything a subcommand needs.
struct App {
    config: Config,
    shutdown: ShutdownHandler,
    quiet: bool,
}

impl App {
    fn open_store(&self) -> Result<Store> {
        let options = self.config.store_options();
        let path = options.path.clone();
        Store::open(options).with_context(|| format!("Failed to open store {}", path.display()))
    }

    fn dispatch_config(&self, phase: &'static str, workers: Option<u16>) -> DispatchConfig {
        let workers = workers
            .map(usize::from)
            .or(self.config.processing.max_workers)
            .unwrap_or(0);
        let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(self.quiet));
        DispatchConfig::new(phase)
            .with_workers(workers)
            .with_shutdown_flag(self.shutdown.get_flag())
            .with_progress_callback(progress)
    }

    fn hasher(&self) -> Hasher {
        Hasher::new()
            .with_chunk_size(self.config.chunk_size_bytes())
            .with_shutdown_flag(self.shutdown.get_flag())
    }

    fn batch_options(&self, phase: &'static str, workers: Option<u16>, force: bool) -> BatchOptions {
        BatchOptions::new(self.dispatch_config(phase, workers))
            .with_force(force)
            .with_hasher(self.hasher())
    }

    fn tag_reader(&self) -> MetadataPipeline {
        MetadataPipeline::new(Arc::new(LoftyTagReader::new()), Arc::new(self.probe()))
    }

    fn probe(&self) -> FfprobeProbe {
        FfprobeProbe::new(
            self.config.processing.ffprobe.clone(),
            self.config.probe_timeout(),
        )
    }

    fn export_format(&self, requested: Option<Option<ExportFormat>>) -> Option<ExportFormat> {
        requested.map(|format| format.unwrap_or(self.config.export.default_format))
    }

    fn export<S: Serialize, R: Serialize>(
        &self,
        format: ExportFormat,
        kind: &str,
        summary: &S,
        rows: &[R],
    ) -> Result<()> {
        let path = output::write_export(&self.config.export.output_dir, kind, format, summary, rows)
            .with_context(|| format!("Failed to export {kind} results"))?;
        self.say(&format!("Exported {} rows to {}", rows.len(), path.display()));
        Ok(())
    }

    fn say(&self, text: &str) {
        if !self.quiet {
            println!("{text}");
        }
    }
}

/// Run one CLI invocation.
///
/// # Errors
///
/// Fatal conditions only: bad configuration, missing target, store
/// contention or failure, interruption. Per-file problems are reported in
/// the summary and do not make this fail.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.debug, cli.quiet);
    console::init_color(cli.no_color);

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let shutdown = install_handler().context("Failed to install Ctrl+C handler")?;
    let ctx = App {
        config,
        shutdown,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Check(args) => run_check(&ctx, &args),
        Commands::Metadata(args) => run_metadata(&ctx, &args),
        Commands::Track(args) => run_track(&ctx, &args),
        Commands::Count(args) => run_count(&ctx, &args),
        Commands::Analyze(args) => run_analyze(&ctx, &args),
        Commands::Db(command) => run_db(&ctx, command),
    }?;

    Ok(ExitCode::Success)
}

/// Map a fatal error to the process exit code.
#[must_use]
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let interrupted = err.chain().any(|cause| {
        cause
            .downcast_ref::<EngineError>()
            .is_some_and(EngineError::is_interrupted)
            || cause
                .downcast_ref::<DispatchError>()
                .is_some_and(|e| matches!(e, DispatchError::Interrupted))
    });
    if interrupted {
        ExitCode::Interrupted
    } else {
        ExitCode::GeneralError
    }
}

fn collect(ctx: &App, path: &Path) -> Result<Vec<PathBuf>> {
    let config = WalkerConfig::default().with_shutdown_flag(ctx.shutdown.get_flag());
    collect_targets(path, &config)
        .with_context(|| format!("Cannot process {}", path.display()))
}

fn execute<P: Pipeline>(
    ctx: &App,
    pipeline: &P,
    files: Vec<PathBuf>,
    options: &BatchOptions,
) -> Result<BatchReport<P::Record>> {
    let mut store = ctx.open_store()?;
    let mut report = run_batch(pipeline, &mut store, files, options)?;
    report.sort_by_path();
    Ok(report)
}

fn run_check(ctx: &App, args: &BatchArgs) -> Result<()> {
    let files = collect(ctx, &args.path)?;
    let processing = &ctx.config.processing;
    let pipeline = IntegrityPipeline::new(Arc::new(FfmpegValidator::new(
        processing.ffmpeg.clone(),
        ctx.config.validation_timeout(),
    )));
    let options = ctx.batch_options(pipeline.phase(), args.workers, args.recheck);

    let report = execute(ctx, &pipeline, files, &options)?;
    let summary = CheckSummary::from_report(&report);
    ctx.say(&console::render_check(&summary, &report, args.verbose));

    if let Some(format) = ctx.export_format(args.export) {
        let rows: Vec<IntegrityRow> = report.outcomes.iter().map(IntegrityRow::from_outcome).collect();
        ctx.export(format, "integrity", &summary, &rows)?;
    }
    Ok(())
}

fn run_metadata(ctx: &App, metadata: &MetadataArgs) -> Result<()> {
    let args = &metadata.batch;
    let files = collect(ctx, &args.path)?;
    let pipeline = ctx.tag_reader();
    let options = ctx.batch_options(pipeline.phase(), args.workers, args.recheck);

    let report = execute(ctx, &pipeline, files, &options)?;
    let summary = MetadataSummary::from_report(&report);
    ctx.say(&console::render_metadata(
        &summary,
        &report,
        args.verbose,
        metadata.summary,
    ));

    if let Some(format) = ctx.export_format(args.export) {
        let rows: Vec<MetadataRow> = report.outcomes.iter().map(MetadataRow::from_outcome).collect();
        ctx.export(format, "metadata", &summary, &rows)?;
    }
    Ok(())
}

/// Targets of several paths, sorted and without duplicates.
fn collect_all(ctx: &App, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        files.extend(collect(ctx, path)?);
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn run_track(ctx: &App, args: &TrackArgs) -> Result<()> {
    let files = collect_all(ctx, &args.paths)?;
    let pipeline = TrackerPipeline::new();
    let options = ctx.batch_options(pipeline.phase(), args.workers, false);
    let report = execute(ctx, &pipeline, files, &options)?;
    let summary = TrackSummary::from_report(&report);
    ctx.say(&console::render_track(&summary, &report, args.verbose));
    Ok(())
}

fn run_count(ctx: &App, args: &CountArgs) -> Result<()> {
    let files = collect_all(ctx, &args.paths)?;
    let library = count_library(
        &ctx.tag_reader(),
        files,
        &ctx.dispatch_config("count", args.workers),
    )?;
    ctx.say(&console::render_count(&library, args.verbose));
    Ok(())
}

fn run_analyze(ctx: &App, args: &AnalyzeArgs) -> Result<()> {
    let files = collect(ctx, &args.path)?;
    let report = analyze_files(
        &ctx.probe(),
        files,
        &ctx.dispatch_config("analyze", args.workers),
    )?;
    let summary = AnalysisSummary::from_report(&report);
    ctx.say(&console::render_analysis(&summary, &report, args.verbose));

    if let Some(format) = ctx.export_format(args.export) {
        let rows: Vec<AnalysisRow> = report.files.iter().map(AnalysisRow::from).collect();
        ctx.export(format, "analysis", &summary, &rows)?;
    }
    Ok(())
}

fn run_db(ctx: &App, command: DbCommand) -> Result<()> {
    let mut store = ctx.open_store()?;
    match command {
        DbCommand::Stats => {
            let counts = store.counts().context("Failed to read store counts")?;
            ctx.say(&console::render_stats(&store.options().path, &counts));
        }
        DbCommand::Check(args) => {
            let issues = inspect(&mut store).context("Store check failed")?;
            ctx.say(&console::render_issues(&issues, args.verbose));
        }
        DbCommand::Verify(args) => run_verify(ctx, &mut store, &args)?,
        DbCommand::Clean => {
            let removed = BatchWriter::new(&mut store)
                .collect_garbage(&Table::ALL)
                .context("Cleanup failed")?;
            ctx.say(&format!("Removed {removed} rows for missing files"));
        }
        DbCommand::Repair => {
            let report = BatchWriter::new(&mut store).repair().context("Repair failed")?;
            ctx.say(&format!(
                "Removed {} rows for missing files, cleared {} sample rates and {} bitrates",
                report.removed, report.sample_rates_cleared, report.bitrates_cleared
            ));
        }
    }
    Ok(())
}

fn run_verify(ctx: &App, store: &mut Store, args: &VerifyArgs) -> Result<()> {
    let all = verify_integrity(store, &ctx.hasher())
        .context("Failed to read stored integrity results")?;
    if ctx.shutdown.is_shutdown_requested() {
        return Err(DispatchError::Interrupted.into());
    }
    let (summary, entries) = filter_entries(all, args.filter);
    ctx.say(&console::render_verify(&summary, &entries, args.verbose));

    if let Some(format) = ctx.export_format(args.export) {
        let rows: Vec<VerifyRow> = entries.iter().map(VerifyRow::from).collect();
        ctx.export(format, "verify", &summary, &rows)?;
    }
    Ok(())
}

/// Summary over every row, plus the rows `filter` keeps for listing and
/// export.
fn filter_entries(
    all: Vec<VerifyEntry>,
    filter: VerifyFilter,
) -> (VerifySummary, Vec<VerifyEntry>) {
    let summary = VerifySummary::from_entries(&all);
    let entries = all.into_iter().filter(|e| filter.matches(e.status)).collect();
    (summary, entries)
}
