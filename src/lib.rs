//! audiotool - change-aware batch maintenance for audio libraries.
//!
//! Verifies stream integrity, collects technical metadata and tags, and
//! tracks files, caching every result in a local SQLite store so unchanged
//! files are never decoded or probed twice.
//!
//! The pieces, bottom up:
//!
//! - [`scanner`]: enumeration, content hashing, mtimes
//! - [`store`]: the locked result store
//! - [`cache`]: per-file reuse decisions
//! - [`tools`]: ffmpeg, ffprobe and the tag reader
//! - [`dispatch`]: the worker pool
//! - [`batch`]: single-commit persistence and cleanup
//! - [`engine`]: batch runs tying the above together
//! - [`output`]: summaries and exports

pub mod app;
pub mod batch;
pub mod cache;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod logging;
pub mod media;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod store;
pub mod tools;

pub use app::{exit_code_for, run_app};
