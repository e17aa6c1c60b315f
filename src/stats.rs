//! Aggregate results of one sync pass

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Operation during which an item failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// Rejected by the path guard before any operation
    Path,
    Clone,
    Update,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Path => "path",
            FailureStage::Clone => "clone",
            FailureStage::Update => "update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub identifier: String,
    pub stage: FailureStage,
}

/// Renders as `owner/repo (clone)`
impl fmt::Display for FailedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.identifier, self.stage.as_str())
    }
}

/// Counters for one pass over a catalog
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackupStats {
    pub total: usize,
    pub cloned: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_branches: usize,
    pub failed_items: Vec<FailedItem>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BackupStats {
    pub fn start(total: usize) -> Self {
        Self {
            total,
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn record_failure(&mut self, identifier: &str, stage: FailureStage) {
        self.failed += 1;
        self.failed_items.push(FailedItem {
            identifier: identifier.to_string(),
            stage,
        });
    }

    /// Items that reached a terminal state so far
    pub fn processed(&self) -> usize {
        self.cloned + self.updated + self.skipped + self.failed
    }

    pub fn elapsed(&self) -> chrono::Duration {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => end - start,
            _ => chrono::Duration::zero(),
        }
    }

    /// Elapsed wall time as `HH:MM:SS`
    pub fn elapsed_display(&self) -> String {
        let secs = self.elapsed().num_seconds().max(0);
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }

    /// First `limit` failed items, plus a count of the ones left out
    pub fn failed_preview(&self, limit: usize) -> String {
        let shown: Vec<String> = self
            .failed_items
            .iter()
            .take(limit)
            .map(ToString::to_string)
            .collect();
        let mut preview = shown.join(", ");
        if self.failed_items.len() > limit {
            preview.push_str(&format!(" ... and {} more", self.failed_items.len() - limit));
        }
        preview
    }
}
