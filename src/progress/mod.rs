use std::time::{Duration, Instant};

use console::Term;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::utils::formatting::format_duration;

/// Progress is drawn only on an interactive stderr and never with `--quiet`.
pub fn should_display(quiet: bool) -> bool {
    !quiet && Term::stderr().is_term()
}

/// Spinner or determinate bar on stderr. Driven only by the coordinating
/// task; worker tasks never touch it.
#[derive(Clone)]
pub struct Progress {
    bar: ProgressBar,
    started: Instant,
}

impl Progress {
    /// Indeterminate spinner for single-account runs.
    pub fn spinner(message: impl Into<String>, visible: bool) -> Self {
        let bar = ProgressBar::with_draw_target(None, draw_target(visible));
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg} [{elapsed}]") {
            bar.set_style(style);
        }
        bar.set_message(message.into());
        if visible {
            bar.enable_steady_tick(Duration::from_millis(120));
        }
        Self { bar, started: Instant::now() }
    }

    /// Determinate bar over `total` units (accounts or services).
    pub fn bar(total: u64, message: impl Into<String>, visible: bool) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total), draw_target(visible));
        if let Ok(style) = ProgressStyle::default_bar().template("  {bar:30.cyan/dark_gray} {pos}/{len} | {msg}") {
            bar.set_style(style.progress_chars("█▓░"));
        }
        bar.set_message(message.into());
        Self { bar, started: Instant::now() }
    }

    /// Hidden indicator, for callers that want no output at all.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            started: Instant::now(),
        }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.bar.set_message(message.into());
    }

    pub fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn finish(&self, message: impl Into<String>) {
        let message = message.into();
        self.bar.finish_with_message(format!(
            "{} ({})",
            message,
            format_duration(self.elapsed().as_millis() as u64)
        ));
    }

    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }

    pub fn abandon(&self, message: impl Into<String>) {
        self.bar.abandon_with_message(message.into());
    }
}

fn draw_target(visible: bool) -> ProgressDrawTarget {
    if visible {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    }
}
