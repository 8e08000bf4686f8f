//! Narrow interfaces to the external collaborators.
//!
//! - [`StreamValidator`] / [`FfmpegValidator`]: full-decode integrity check
//! - [`MediaProbe`] / [`FfprobeProbe`]: stream facts from ffprobe
//! - [`TagReader`] / [`LoftyTagReader`]: container, properties and tags
//!
//! Subprocesses always run under a caller-side deadline
//! ([`command::run_with_timeout`]). Tests substitute in-process
//! implementations of the traits.

pub mod command;
pub mod ffmpeg;
pub mod ffprobe;
pub mod tags;

use std::path::PathBuf;
use std::time::Duration;

pub use command::{run_with_timeout, ToolOutput};
pub use ffmpeg::{FfmpegValidator, StreamValidator, Validation};
pub use ffprobe::{parse_probe_json, FfprobeProbe, MediaProbe};
pub use tags::{LoftyTagReader, TagReader};

/// Errors from external tools and the tag reader.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    /// The program is not on `PATH`.
    #[error("{0} is not installed or not on PATH")]
    NotInstalled(String),

    /// The program ran past its deadline and was killed.
    #[error("{program} timed out after {timeout:?}")]
    TimedOut {
        /// Program name
        program: String,
        /// Deadline that was exceeded
        timeout: Duration,
    },

    /// The program ran but reported failure.
    #[error("{program} failed: {message}")]
    Failed {
        /// Program name
        program: String,
        /// Exit status and stderr
        message: String,
    },

    /// The program's output could not be understood.
    #[error("Could not parse {program} output: {message}")]
    Parse {
        /// Program name
        program: String,
        /// Parser message
        message: String,
    },

    /// The file format is not supported for tag reading.
    #[error("Unsupported file type: {0}")]
    Unsupported(PathBuf),

    /// The tag reader rejected the file.
    #[error("Could not read tags from {path}: {message}")]
    Tags {
        /// File that failed
        path: PathBuf,
        /// Reader message
        message: String,
    },

    /// Spawning or waiting on the program failed.
    #[error("I/O error running {program}: {source}")]
    Io {
        /// Program name
        program: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
