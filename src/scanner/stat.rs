//! Modification-time probe.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use super::StatError;

/// Read a file's modification time as seconds since the Unix epoch.
///
/// Sub-second precision is kept, so two writes within the same second
/// still produce different values on filesystems that record nanoseconds.
///
/// # Errors
///
/// [`StatError::NotFound`] if the file is gone, [`StatError::Io`] otherwise.
pub fn stat_mtime(path: &Path) -> Result<f64, StatError> {
    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => StatError::NotFound(path.to_path_buf()),
        _ => StatError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    let modified = metadata.modified().map_err(|e| StatError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(system_time_to_secs(modified))
}

/// Convert a `SystemTime` into signed epoch seconds.
#[must_use]
pub fn system_time_to_secs(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}
