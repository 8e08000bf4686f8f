//! Change-aware cache decisions.
//!
//! For every file the engine compares what is on disk with what the store
//! holds and picks one [`CacheAction`]:
//!
//! | Stored row | `--recheck` | mtime equal | hash equal | Action |
//! |---|---|---|---|---|
//! | none | any | | | `RunFreshCheck` |
//! | present | yes | | | `RunFreshCheck` |
//! | present | no | yes | | `UseCached` |
//! | present | no | no | yes | `UpdateMtimeOnly` |
//! | present | no | no | no, or no stored hash | `RunFreshCheck` |
//! | file missing | | | | `FileNotFound` |
//!
//! The mtime is always compared first; the file is only hashed when a
//! stored hash exists and the mtime moved. Rows without a hash (the file
//! tracker) therefore behave as a plain mtime cache.

pub mod decision;

pub use decision::{
    classify, CacheAction, CacheDecision, DecisionEngine, Fingerprint, Fingerprinted,
};
