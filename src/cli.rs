//! Command-line interface definitions for audiotool.
//!
//! # Example
//!
//! ```bash
//! # Verify every file under a directory, reusing cached verdicts
//! audiotool check ~/Music
//!
//! # Re-decode everything and export the results as CSV
//! audiotool check ~/Music --recheck --export csv
//!
//! # Collect tags and stream facts with 8 workers
//! audiotool metadata ~/Music --workers 8
//!
//! # Albums and disk usage per codec, stream quality warnings
//! audiotool count ~/Music -v
//! audiotool analyze ~/Music
//!
//! # Store maintenance
//! audiotool db stats
//! audiotool db check
//! audiotool db verify --filter failed
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::engine::VerifyStatus;
use crate::output::ExportFormat;

/// Change-aware batch maintenance for audio libraries.
///
/// Results are cached in a local database; unchanged files are never
/// decoded or probed twice.
#[derive(Debug, Parser)]
#[command(name = "audiotool")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log detail (-d for debug, -dd for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (default: ./audiotool.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Verify stream integrity by decoding every file
    Check(BatchArgs),
    /// Collect technical metadata and tags
    Metadata(MetadataArgs),
    /// Record files and report which were added or changed
    Track(TrackArgs),
    /// Count albums, songs and disk usage per codec
    Count(CountArgs),
    /// Probe stream properties and flag lossy or low-quality files
    Analyze(AnalyzeArgs),
    /// Inspect and maintain the result store
    #[command(subcommand)]
    Db(DbCommand),
}

/// Arguments shared by `check` and `metadata`.
#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Audio file or directory to process
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// List every file, not just problems
    #[arg(short, long)]
    pub verbose: bool,

    /// Worker threads (default: processing.max_workers or CPU count)
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,

    /// Ignore cached results and process every file again
    #[arg(short, long)]
    pub recheck: bool,

    /// Export results (format defaults to export.default_format)
    #[arg(long, value_enum, value_name = "FORMAT", num_args = 0..=1)]
    pub export: Option<Option<ExportFormat>>,
}

/// Arguments for `metadata`.
#[derive(Debug, Args)]
pub struct MetadataArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Print only the summary counts
    #[arg(short, long, conflicts_with = "verbose")]
    pub summary: bool,
}

/// Arguments for `track`.
#[derive(Debug, Args)]
pub struct TrackArgs {
    /// Audio files or directories to track
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// List added and updated files
    #[arg(short, long)]
    pub verbose: bool,

    /// Worker threads (default: processing.max_workers or CPU count)
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,
}

/// Arguments for `count`.
#[derive(Debug, Args)]
pub struct CountArgs {
    /// Audio files or directories to count
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// List the files of every album
    #[arg(short, long)]
    pub verbose: bool,

    /// Worker threads (default: processing.max_workers or CPU count)
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,
}

/// Arguments for `analyze`.
#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Audio file or directory to analyze
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Print the full report for every file
    #[arg(short, long)]
    pub verbose: bool,

    /// Worker threads (default: processing.max_workers or CPU count)
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,

    /// Export the report (format defaults to export.default_format)
    #[arg(long, value_enum, value_name = "FORMAT", num_args = 0..=1)]
    pub export: Option<Option<ExportFormat>>,
}

/// `db` subcommands.
#[derive(Debug, Subcommand)]
pub enum DbCommand {
    /// Row counts per table and status
    Stats,
    /// Report store problems without changing anything
    Check(StoreCheckArgs),
    /// Compare stored integrity results with the files on disk
    Verify(VerifyArgs),
    /// Remove rows for files that no longer exist
    Clean,
    /// Clean, then clear out-of-range sample rates and bitrates
    Repair,
}

/// Arguments for `db check`.
#[derive(Debug, Args)]
pub struct StoreCheckArgs {
    /// List every issue, not just the counts
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for `db verify`.
#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Which entries to report
    #[arg(short, long, value_enum, default_value = "all")]
    pub filter: VerifyFilter,

    /// Export the entries (format defaults to export.default_format)
    #[arg(long, value_enum, value_name = "FORMAT", num_args = 0..=1)]
    pub export: Option<Option<ExportFormat>>,

    /// List every entry, not just problems
    #[arg(short, long)]
    pub verbose: bool,
}

/// Entry filter for `db verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum VerifyFilter {
    /// Every stored row
    #[default]
    All,
    /// Rows that still pass
    Passed,
    /// Failed, missing, changed or unreadable rows
    Failed,
}

impl VerifyFilter {
    #[must_use]
    pub fn matches(self, status: VerifyStatus) -> bool {
        match self {
            Self::All => true,
            Self::Passed => status == VerifyStatus::Passed,
            Self::Failed => status.is_problem(),
        }
    }
}
