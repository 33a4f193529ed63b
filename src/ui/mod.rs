//! Terminal progress reporting for a verification run, rendered via
//! `indicatif`. The orchestrator talks to the [`ProgressReporter`] trait so
//! tests can swap in [`NullReporter`] and assert on behavior, not output.

use std::sync::Mutex;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Step-level progress sink for one verification run.
pub trait ProgressReporter: Send + Sync {
    fn step_started(&self, step: u32, total: u32, label: &str);
    fn step_completed(&self, step: u32, total: u32, label: &str, success: bool);
}

/// Spinner-based reporter for interactive terminals.
///
/// One spinner is live at a time; completing a step finishes its spinner
/// with a ✓/✗ line and the next step starts a fresh one.
pub struct ConsoleReporter {
    current: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    fn spinner() -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("progress bar template is a valid static string"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleReporter {
    fn step_started(&self, step: u32, total: u32, label: &str) {
        let bar = Self::spinner();
        bar.set_message(format!("[{}/{}] {}", style(step).cyan(), total, label));
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.replace(bar) {
            previous.finish_and_clear();
        }
    }

    fn step_completed(&self, step: u32, total: u32, label: &str, success: bool) {
        let mark = if success {
            style("✓").green()
        } else {
            style("✗").red()
        };
        let line = format!("{mark} [{step}/{total}] {label}");
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        match current.take() {
            Some(bar) => bar.finish_with_message(line),
            None => println!("{line}"),
        }
    }
}

/// Discards all progress events. Used in tests and non-interactive runs.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn step_started(&self, _step: u32, _total: u32, _label: &str) {}
    fn step_completed(&self, _step: u32, _total: u32, _label: &str, _success: bool) {}
}
