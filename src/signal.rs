//! Ctrl+C handling.
//!
//! A single shared `AtomicBool` is raised when the process receives SIGINT
//! (or SIGTERM, through the `termination` feature of `ctrlc`). The walker,
//! the hasher and the dispatcher poll it; nothing is persisted once it is set.
//!
//! ```rust,no_run
//! use audiotool::signal::install_handler;
//!
//! let handler = install_handler().expect("signal handler");
//! let flag = handler.get_flag();
//! // hand `flag` to Walker / Hasher / DispatchConfig
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit status for an interrupted run (128 + SIGINT).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether Ctrl+C was received or [`request_shutdown`](Self::request_shutdown) was called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Raise the flag by hand.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// A clone of the underlying flag for worker components.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Lower the flag again.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error installing the OS signal hook.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// `ctrlc` refused the handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C hook, or reuse the one already installed.
///
/// `ctrlc` accepts only one handler per process. Later calls (several
/// `run_app` invocations in one test binary, for instance) get the existing
/// handler back with its flag lowered.
///
/// # Errors
///
/// Never fails in practice: if the hook cannot be registered an unhooked
/// handler is returned so manual shutdown still works.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();
    let hooked = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Discarding unsaved results...");
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    });

    if let Err(e) = hooked {
        log::debug!("Ctrl+C hook not installed ({}), using unhooked handler", e);
    }
    let _ = GLOBAL_HANDLER.set(handler);
    let installed = GLOBAL_HANDLER.get().cloned().unwrap_or_default();
    installed.reset();
    Ok(installed)
}
