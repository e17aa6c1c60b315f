//! Per-item progress reporting
//!
//! The engine emits one [`ProgressEvent`] per catalog item; rendering is up to
//! the [`ProgressSink`] the caller installs.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Action label, e.g. `CLONE`, `PULL`, `SKIP`
    pub label: String,
    pub identifier: String,
    /// 1-based position in the catalog
    pub index: usize,
    pub total: usize,
    pub failed_so_far: usize,
}

pub trait ProgressSink: Send + Sync {
    fn on_item(&self, event: &ProgressEvent);

    /// Called once after the last item
    fn finish(&self, _message: &str) {}
}

/// Discards every event
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_item(&self, _event: &ProgressEvent) {}
}

/// Narrates each item through `tracing`, used in verbose mode
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_item(&self, event: &ProgressEvent) {
        info!(
            "[{}/{}] {:<5} {} (failed so far: {})",
            event.index, event.total, event.label, event.identifier, event.failed_so_far
        );
    }

    fn finish(&self, message: &str) {
        info!("{}", message);
    }
}

/// Single aggregated terminal progress bar
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn on_item(&self, event: &ProgressEvent) {
        let Ok(mut guard) = self.bar.lock() else {
            return;
        };
        let bar = guard.get_or_insert_with(|| {
            let bar = ProgressBar::new(event.total as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
            ) {
                bar.set_style(style.progress_chars("=>-"));
            }
            bar
        });
        bar.set_position(event.index as u64);
        bar.set_message(format!(
            "failed: {} | {} {}",
            event.failed_so_far, event.label, event.identifier
        ));
    }

    fn finish(&self, message: &str) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_with_message(message.to_string());
            }
        }
    }
}
