//! Progress reporting with indicatif.
//!
//! The dispatcher reports through the [`ProgressCallback`] trait; the CLI
//! plugs in [`Progress`], which draws one bar per phase (`check`,
//! `extract`, `track`). Tests use silent implementations of the trait.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Receives progress events from a batch run.
pub trait ProgressCallback: Send + Sync {
    /// A phase begins with `total` items to work through.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Item number `current` (1-based, completion order) has finished.
    fn on_progress(&self, current: usize, path: &str);

    /// The phase is over.
    fn on_phase_end(&self, phase: &str);

    /// Free-form status update.
    fn on_message(&self, _message: &str) {}
}

/// Terminal progress bars.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a reporter. Nothing is drawn when `quiet` is set.
    ///
    /// ```
    /// use audiotool::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn style(phase: &str) -> ProgressStyle {
        let color = match phase {
            "check" => "green",
            "extract" => "cyan",
            _ => "yellow",
        };
        ProgressStyle::with_template(&format!(
            "[{{elapsed_precise}}] [{{bar:40.{color}/blue}}] {{pos}}/{{len}} ({{percent}}%) {{msg}} (ETA: {{eta}})"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn label(phase: &str) -> &str {
        match phase {
            "check" => "Checking",
            "extract" => "Extracting",
            "track" => "Tracking",
            other => other,
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }
        let pb = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        pb.set_style(Self::style(phase));
        pb.set_message(Self::label(phase).to_string());
        *self.bar.lock().unwrap() = Some(pb);
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        if let Some(ref pb) = *self.bar.lock().unwrap() {
            pb.set_position(current as u64);
            pb.set_message(truncate_path(path, 30));
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        if let Some(pb) = self.bar.lock().unwrap().take() {
            pb.finish_with_message(format!("{} complete", Self::label(phase)));
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        if let Some(ref pb) = *self.bar.lock().unwrap() {
            pb.set_message(message.to_string());
        }
    }
}

/// Shorten a path to roughly `max_len` characters, keeping the file name.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let keep = max_len.saturating_sub(3);
        let tail: String = file_name.chars().skip(name_len.saturating_sub(keep)).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
