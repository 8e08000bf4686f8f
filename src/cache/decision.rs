//! Per-file cache decisions.

use std::path::Path;

use crate::scanner::{stat_mtime, Hasher, StatError};
use crate::store::{timestamp_now, IntegrityRecord, MetadataRecord, TrackedRecord};

/// What to do with one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheAction {
    /// No usable stored result: run the expensive operation.
    RunFreshCheck,
    /// Stored mtime matches: reuse the stored result as is.
    UseCached,
    /// Content unchanged but mtime moved: keep the result, store the new mtime.
    UpdateMtimeOnly,
    /// The file is gone.
    FileNotFound,
}

impl CacheAction {
    /// Whether this action needs a worker.
    #[must_use]
    pub fn needs_work(self) -> bool {
        self == Self::RunFreshCheck
    }
}

/// The stored side of a comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fingerprint<'a> {
    pub mtime: Option<f64>,
    pub content_hash: Option<&'a str>,
}

/// A stored row that carries an mtime and optionally a content hash.
pub trait Fingerprinted: Clone {
    fn stored_mtime(&self) -> Option<f64>;

    /// `None` for tables that do not track content.
    fn stored_hash(&self) -> Option<&str>;

    /// A copy of this row re-stamped with a new mtime (and hash, when known).
    #[must_use]
    fn with_fingerprint(&self, mtime: f64, content_hash: Option<String>) -> Self;

    fn fingerprint(&self) -> Fingerprint<'_> {
        Fingerprint {
            mtime: self.stored_mtime(),
            content_hash: self.stored_hash(),
        }
    }
}

/// Decide the action for a file that exists on disk.
///
/// `current_hash` is called at most once, and only when the row has a
/// stored hash and the mtime differs. The hash it returned (if any) comes
/// back alongside the action so workers do not read the file twice.
pub fn classify<F>(
    stored: Option<Fingerprint<'_>>,
    force: bool,
    current_mtime: f64,
    current_hash: F,
) -> (CacheAction, Option<String>)
where
    F: FnOnce() -> Option<String>,
{
    let Some(stored) = stored else {
        return (CacheAction::RunFreshCheck, None);
    };
    if force {
        return (CacheAction::RunFreshCheck, None);
    }
    if stored.mtime == Some(current_mtime) {
        return (CacheAction::UseCached, None);
    }
    let Some(stored_hash) = stored.content_hash else {
        return (CacheAction::RunFreshCheck, None);
    };
    match current_hash() {
        Some(hash) if hash.eq_ignore_ascii_case(stored_hash) => {
            (CacheAction::UpdateMtimeOnly, Some(hash))
        }
        other => (CacheAction::RunFreshCheck, other),
    }
}

/// Result of [`DecisionEngine::decide`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheDecision {
    pub action: CacheAction,
    /// On-disk mtime; `None` only for [`CacheAction::FileNotFound`]
    pub mtime: Option<f64>,
    /// Content hash computed while deciding, if any
    pub content_hash: Option<String>,
}

/// Applies [`classify`] to real files.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    hasher: Hasher,
    force: bool,
}

impl DecisionEngine {
    #[must_use]
    pub fn new(hasher: Hasher, force: bool) -> Self {
        Self { hasher, force }
    }

    /// Whether `--recheck` is in effect.
    #[must_use]
    pub fn force(&self) -> bool {
        self.force
    }

    /// Hasher used for the content fallback.
    #[must_use]
    pub fn hasher(&self) -> &Hasher {
        &self.hasher
    }

    /// Stat the file and classify it against its stored row.
    ///
    /// # Errors
    ///
    /// [`StatError::Io`] if the mtime cannot be read for a reason other than
    /// the file being missing (which yields [`CacheAction::FileNotFound`]).
    pub fn decide<R: Fingerprinted>(
        &self,
        path: &Path,
        stored: Option<&R>,
    ) -> Result<CacheDecision, StatError> {
        let mtime = match stat_mtime(path) {
            Ok(mtime) => mtime,
            Err(StatError::NotFound(_)) => {
                log::debug!("File disappeared before processing: {}", path.display());
                return Ok(CacheDecision {
                    action: CacheAction::FileNotFound,
                    mtime: None,
                    content_hash: None,
                });
            }
            Err(e) => return Err(e),
        };

        let (action, content_hash) =
            classify(stored.map(R::fingerprint), self.force, mtime, || {
                match self.hasher.hash_file_hex(path) {
                    Ok(hash) => Some(hash),
                    Err(e) => {
                        log::debug!("Hash fallback failed for {}: {}", path.display(), e);
                        None
                    }
                }
            });

        match action {
            CacheAction::UseCached => log::trace!("Cache hit: {}", path.display()),
            CacheAction::UpdateMtimeOnly => {
                log::trace!("Cache hit (content unchanged): {}", path.display());
            }
            _ => log::trace!("Cache miss: {}", path.display()),
        }

        Ok(CacheDecision {
            action,
            mtime: Some(mtime),
            content_hash,
        })
    }
}

impl Fingerprinted for IntegrityRecord {
    fn stored_mtime(&self) -> Option<f64> {
        self.mtime
    }

    fn stored_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    fn with_fingerprint(&self, mtime: f64, content_hash: Option<String>) -> Self {
        Self {
            mtime: Some(mtime),
            content_hash: content_hash.or_else(|| self.content_hash.clone()),
            last_checked: timestamp_now(),
            ..self.clone()
        }
    }
}

impl Fingerprinted for MetadataRecord {
    fn stored_mtime(&self) -> Option<f64> {
        self.mtime
    }

    fn stored_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    fn with_fingerprint(&self, mtime: f64, content_hash: Option<String>) -> Self {
        Self {
            mtime: Some(mtime),
            content_hash: content_hash.or_else(|| self.content_hash.clone()),
            last_checked: timestamp_now(),
            ..self.clone()
        }
    }
}

impl Fingerprinted for TrackedRecord {
    fn stored_mtime(&self) -> Option<f64> {
        self.mtime
    }

    fn stored_hash(&self) -> Option<&str> {
        None
    }

    fn with_fingerprint(&self, mtime: f64, _content_hash: Option<String>) -> Self {
        Self {
            mtime: Some(mtime),
            last_updated: timestamp_now(),
            ..self.clone()
        }
    }
}
