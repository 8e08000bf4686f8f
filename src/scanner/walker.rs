//! Audio file enumeration using walkdir.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing a directory
//! tree and yielding audio files in a deterministic (name-sorted) order,
//! and [`collect_targets`] which resolves a CLI target that may be either
//! a single file or a directory.
//!
//! # Example
//!
//! ```no_run
//! use audiotool::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Music"), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) => println!("{}", path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::{DirEntry, WalkDir};

use super::{is_audio_file, ScanError, WalkerConfig};

/// Directory walker for audio file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker rooted at `path`.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        let shutdown_flag = config.shutdown_flag.clone();
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag,
        }
    }

    /// Stop yielding entries once the flag is raised.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn is_hidden(entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with('.'))
    }

    /// Walk the tree and yield every audio file.
    ///
    /// Unreadable entries are yielded as errors; the walk continues.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, ScanError>> + '_ {
        let skip_hidden = self.config.skip_hidden;

        WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !(skip_hidden && Self::is_hidden(entry)))
            .take_while(move |_| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    false
                } else {
                    true
                }
            })
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() && !entry.path_is_symlink() {
                        return None;
                    }
                    let path = entry.into_path();
                    if !is_audio_file(&path) {
                        log::trace!("Skipping non-audio file: {}", path.display());
                        return None;
                    }
                    if !path.is_file() {
                        // Dangling or directory symlink
                        return None;
                    }
                    Some(Ok(path))
                }
                Err(e) => Some(Err(self.convert_error(e))),
            })
    }

    fn convert_error(&self, error: walkdir::Error) -> ScanError {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        match error.io_error().map(std::io::Error::kind) {
            Some(std::io::ErrorKind::PermissionDenied) => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path)
            }
            Some(std::io::ErrorKind::NotFound) => ScanError::NotFound(path),
            _ => {
                log::warn!("Walker error for {}: {}", path.display(), error);
                ScanError::Io {
                    path,
                    source: std::io::Error::other(error.to_string()),
                }
            }
        }
    }
}

/// Resolve a CLI target into the list of audio files to process.
///
/// The target is canonicalized so the same physical file always maps to
/// the same store key regardless of how it was spelled on the command line.
/// Walk errors below the root are logged and skipped.
///
/// # Errors
///
/// - [`ScanError::NotFound`] if the target does not exist
/// - [`ScanError::NotAudio`] if it is a regular file without an audio extension
pub fn collect_targets(target: &Path, config: &WalkerConfig) -> Result<Vec<PathBuf>, ScanError> {
    let root = std::fs::canonicalize(target).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ScanError::NotFound(target.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => ScanError::PermissionDenied(target.to_path_buf()),
        _ => ScanError::Io {
            path: target.to_path_buf(),
            source: e,
        },
    })?;

    if root.is_file() {
        return if is_audio_file(&root) {
            Ok(vec![root])
        } else {
            Err(ScanError::NotAudio(target.to_path_buf()))
        };
    }

    let walker = Walker::new(&root, config.clone());
    let mut files = Vec::new();
    for entry in walker.walk() {
        match entry {
            Ok(path) => files.push(path),
            Err(e) => log::warn!("Skipping unreadable entry: {}", e),
        }
    }
    log::debug!("Found {} audio files under {}", files.len(), root.display());
    Ok(files)
}
