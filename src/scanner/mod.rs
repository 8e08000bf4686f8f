//! Scanner module for file discovery, modification times and content hashing.
//!
//! This module provides functionality for:
//! - Enumerating audio files below a target path
//! - Reading modification times as floating-point epoch seconds
//! - Content hashing with BLAKE3 (streaming, constant memory)
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Target resolution and directory traversal
//! - [`hasher`]: BLAKE3 file hashing (streaming)
//! - [`stat`]: Modification-time probe
//!
//! Everything here is side-effect free with respect to the filesystem.
//!
//! # Example
//!
//! ```no_run
//! use audiotool::scanner::{stat_mtime, Hasher, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/music"), WalkerConfig::default());
//! for path in walker.walk().filter_map(Result::ok) {
//!     let mtime = stat_mtime(&path).unwrap();
//!     let hash = Hasher::new().hash_file(&path).unwrap();
//!     println!("{} {} {}", path.display(), mtime, audiotool::scanner::hash_to_hex(&hash));
//! }
//! ```

pub mod hasher;
pub mod stat;
pub mod walker;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

// Re-export main types
pub use hasher::{hash_to_hex, Hash, Hasher, DEFAULT_CHUNK_SIZE};
pub use stat::stat_mtime;
pub use walker::{collect_targets, Walker};

/// File extensions recognized as audio, lowercase and without the dot.
pub const AUDIO_EXTENSIONS: &[&str] = &["flac", "wav", "m4a", "mp3", "ogg", "opus", "ape", "wv", "wma"];

/// Check whether a path has one of the [`AUDIO_EXTENSIONS`] (case-insensitive).
#[must_use]
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Convert a path into the string key used by the store.
#[must_use]
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Warning: May cause infinite loops with symlink cycles.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Stop enumerating once this flag is raised.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
}

impl WalkerConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(follow_symlinks: bool, skip_hidden: bool) -> Self {
        Self {
            follow_symlinks,
            skip_hidden,
            shutdown_flag: None,
        }
    }

    /// Observe a Ctrl+C flag while walking.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }
}

/// Errors that can occur during target resolution and directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The path exists but is neither an audio file nor a directory.
    #[error("Not an audio file or directory: {0}")]
    NotAudio(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while reading a file's modification time.
#[derive(thiserror::Error, Debug)]
pub enum StatError {
    /// The file does not exist (it may have been removed after enumeration).
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Any other I/O failure.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Hashing stopped because shutdown was requested.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error raised while hashing `path`.
    pub(crate) fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
