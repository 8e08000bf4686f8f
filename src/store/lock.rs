//! Advisory file lock guarding every store critical section.
//!
//! The lock file is opened once, at [`StoreLock::open`]. Each critical
//! section calls [`StoreLock::acquire`] and holds the returned
//! [`LockGuard`]; dropping the guard releases the lock, so it is released
//! on early return, on error and on panic unwind alike.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs4::fs_std::FileExt;

use super::StoreError;

/// How long to sleep between non-blocking lock attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Handle on the lock file shared by every process using the same store.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    file: File,
}

impl StoreLock {
    /// Open (creating if needed) the lock file at `path`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] if the file or its parent directory cannot be created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the exclusive lock, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Contention`] if another holder keeps the lock past the
    /// deadline, [`StoreError::Io`] for any other locking failure.
    pub fn acquire(&self, timeout: Duration) -> Result<LockGuard<'_>, StoreError> {
        let started = Instant::now();
        let contended = fs4::lock_contended_error();

        loop {
            match self.file.try_lock_exclusive() {
                Ok(()) => {
                    log::trace!(
                        "Acquired store lock {} after {:?}",
                        self.path.display(),
                        started.elapsed()
                    );
                    return Ok(LockGuard { lock: self });
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.raw_os_error() == contended.raw_os_error() =>
                {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        return Err(StoreError::Contention {
                            path: self.path.clone(),
                            waited,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL.min(timeout - waited));
                }
                Err(e) => return Err(StoreError::io(&self.path, e)),
            }
        }
    }
}

/// Holds the store lock until dropped.
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a StoreLock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.lock.file) {
            log::warn!(
                "Failed to release store lock {}: {}",
                self.lock.path.display(),
                e
            );
        }
    }
}
