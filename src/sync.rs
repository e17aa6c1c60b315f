//! Sync Engine - Orchestrates sequential mirror synchronization
//!
//! For every catalog item the engine resolves a safe mirror path, asks the
//! [`UpdateDecider`] whether the mirror is absent, stale or current, and then
//! clones, updates or skips it. Clone and update run inside a bounded retry
//! loop with exponential backoff. Items are processed strictly in catalog
//! order and one at a time; the mirror root is never touched concurrently.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::branches::BranchMirror;
use crate::config::SyncConfig;
use crate::decider::{Freshness, UpdateDecider, DEFAULT_TOLERANCE_SECS};
use crate::discovery::MirrorItem;
use crate::error::SyncError;
use crate::git::{authenticated_url, Credential, GitClient};
use crate::health::HealthVerifier;
use crate::path_guard;
use crate::process::CommandRunner;
use crate::progress::{NoProgress, ProgressEvent, ProgressSink};
use crate::stats::{BackupStats, FailureStage};

/// Action computed once per item per pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    Clone,
    Update,
    Skip,
}

impl SyncDecision {
    pub fn label(&self) -> &'static str {
        match self {
            SyncDecision::Clone => "CLONE",
            SyncDecision::Update => "PULL",
            SyncDecision::Skip => "SKIP",
        }
    }
}

impl From<Freshness> for SyncDecision {
    fn from(freshness: Freshness) -> Self {
        match freshness {
            Freshness::Absent => SyncDecision::Clone,
            Freshness::Stale => SyncDecision::Update,
            Freshness::Current => SyncDecision::Skip,
        }
    }
}

/// Label reported for items the path guard refused
pub const REJECT_LABEL: &str = "REJECT";

/// Engine knobs, usually derived from the `sync` config section
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Per git command
    pub timeout: Duration,
    pub max_retries: u32,
    pub all_branches: bool,
    pub prune: bool,
    pub tolerance_secs: i64,
    pub probe_remote_tip: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 5,
            all_branches: true,
            prune: true,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
            probe_remote_tip: true,
        }
    }
}

impl From<&SyncConfig> for EngineSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout),
            max_retries: config.max_retries,
            all_branches: config.all_branches,
            prune: config.prune,
            tolerance_secs: config.tolerance_secs,
            probe_remote_tip: config.probe_remote_tip,
        }
    }
}

/// Sleep before retrying after the 0-based `attempt` failed
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// Terminal state of one item within a pass
#[derive(Debug)]
enum ItemOutcome {
    Cloned,
    Updated,
    Skipped,
    Failed(FailureStage),
}

/// The main sync engine that mirrors a catalog into a root directory
pub struct SyncEngine {
    settings: EngineSettings,
    git: GitClient,
    health: HealthVerifier,
    decider: UpdateDecider,
    branches: BranchMirror,
    credential: Option<Credential>,
    progress: Box<dyn ProgressSink>,
    cancel: Option<Arc<AtomicBool>>,
}

impl SyncEngine {
    /// Create an engine whose git commands all go through `runner`
    pub fn new(settings: EngineSettings, runner: Arc<dyn CommandRunner>) -> Self {
        let git = GitClient::new(runner, settings.timeout);
        Self {
            health: HealthVerifier::new(git.clone()),
            decider: UpdateDecider::new(
                git.clone(),
                settings.tolerance_secs,
                settings.probe_remote_tip,
            ),
            branches: BranchMirror::new(git.clone()),
            git,
            settings,
            credential: None,
            progress: Box::new(NoProgress),
            cancel: None,
        }
    }

    /// Token injected into http(s) clone URLs
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Stop before the next item once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Classify `item` without touching the mirror
    pub async fn plan(&self, root: &Path, item: &dyn MirrorItem) -> Result<SyncDecision, SyncError> {
        let path = path_guard::resolve(root, &item.local_name())?;
        Ok(self.decider.decide(&path, item).await.into())
    }

    /// Run one pass over `items`, mirroring each below `root`.
    ///
    /// Per-item failures are recorded in the returned stats and never stop
    /// the pass; only the cancellation flag ends it early.
    pub async fn process<T: MirrorItem>(&self, root: &Path, items: &[T]) -> BackupStats {
        let mut stats = BackupStats::start(items.len());

        if let Err(e) = tokio::fs::create_dir_all(root).await {
            error!("Failed to create mirror root {}: {}", root.display(), e);
        }

        info!("Processing {} items into {}", items.len(), root.display());

        for (index, item) in items.iter().enumerate() {
            if self.is_cancelled() {
                warn!(
                    "Sync cancelled after {} of {} items",
                    stats.processed(),
                    items.len()
                );
                break;
            }

            let outcome = self.process_item(root, item, index, &stats).await;
            match outcome {
                ItemOutcome::Cloned => stats.cloned += 1,
                ItemOutcome::Updated => stats.updated += 1,
                ItemOutcome::Skipped => stats.skipped += 1,
                ItemOutcome::Failed(stage) => stats.record_failure(item.identifier(), stage),
            }

            if !matches!(outcome, ItemOutcome::Failed(_)) {
                if let Ok(path) = path_guard::resolve(root, &item.local_name()) {
                    stats.total_branches += self.count_branches(&path).await;
                }
            }
        }

        stats.finish();
        info!(
            "Pass finished in {}: {} cloned, {} updated, {} skipped, {} failed",
            stats.elapsed_display(),
            stats.cloned,
            stats.updated,
            stats.skipped,
            stats.failed
        );
        self.progress.finish(&format!(
            "{} of {} processed, {} failed",
            stats.processed(),
            stats.total,
            stats.failed
        ));

        stats
    }

    async fn process_item<T: MirrorItem>(
        &self,
        root: &Path,
        item: &T,
        index: usize,
        stats: &BackupStats,
    ) -> ItemOutcome {
        let identifier = item.identifier();
        let event = |label: &str| ProgressEvent {
            label: label.to_string(),
            identifier: identifier.to_string(),
            index: index + 1,
            total: stats.total,
            failed_so_far: stats.failed,
        };

        let path = match path_guard::resolve(root, &item.local_name()) {
            Ok(path) => path,
            Err(e) => {
                error!("Skipping {}: {}", identifier, e);
                self.progress.on_item(&event(REJECT_LABEL));
                return ItemOutcome::Failed(FailureStage::Path);
            }
        };

        let decision = SyncDecision::from(self.decider.decide(&path, item).await);
        self.progress.on_item(&event(decision.label()));
        debug!("{} -> {}", identifier, decision.label());

        match decision {
            SyncDecision::Skip => ItemOutcome::Skipped,
            SyncDecision::Clone => {
                if path.exists() {
                    info!("Removing unusable mirror at {}", path.display());
                    remove_dir(&path).await;
                }
                match self.clone_with_retry(item, &path).await {
                    Ok(()) => {
                        info!("Cloned {}", identifier);
                        ItemOutcome::Cloned
                    }
                    Err(e) => {
                        error!("Clone of {} failed: {}", identifier, e);
                        ItemOutcome::Failed(FailureStage::Clone)
                    }
                }
            }
            SyncDecision::Update => match self.update_with_retry(item, &path).await {
                Ok(()) => {
                    info!("Updated {}", identifier);
                    ItemOutcome::Updated
                }
                Err(e) => {
                    error!("Update of {} failed: {}", identifier, e);
                    ItemOutcome::Failed(FailureStage::Update)
                }
            },
        }
    }

    /// Clone until a healthy mirror exists or the retry budget is spent
    async fn clone_with_retry(&self, item: &dyn MirrorItem, path: &Path) -> Result<(), SyncError> {
        let url = authenticated_url(item.remote_url(), self.credential.as_ref());
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < self.settings.max_retries {
            match self.clone_once(&url, path).await {
                Ok(()) => {
                    if self.settings.all_branches && !self.branches.mirror_branches(path).await {
                        warn!("Branch replication incomplete for {}", item.identifier());
                    }
                    return Ok(());
                }
                Err(e) if !e.is_transient() => {
                    if path.exists() {
                        remove_dir(path).await;
                    }
                    return Err(e);
                }
                Err(e) => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "Clone attempt {}/{} for {} failed: {}; retrying in {}s",
                        attempt + 1,
                        self.settings.max_retries,
                        item.identifier(),
                        e,
                        delay.as_secs()
                    );
                    last_error = Some(e);
                    if path.exists() {
                        remove_dir(path).await;
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }

        Err(exhausted(attempt, last_error))
    }

    async fn clone_once(&self, url: &str, path: &Path) -> Result<(), SyncError> {
        self.git.clone_repository(url, path).await?;

        if self.settings.all_branches {
            if let Err(e) = self.git.fetch_all(path, false).await {
                warn!("Fetching all refs into {} failed: {}", path.display(), e);
            }
        }

        if !self.health.is_healthy(path).await {
            return Err(SyncError::HealthCheck(path.to_path_buf()));
        }
        Ok(())
    }

    /// Fast-forward an existing mirror; an unhealthy result escalates to a
    /// fresh clone with its own retry budget
    async fn update_with_retry(&self, item: &dyn MirrorItem, path: &Path) -> Result<(), SyncError> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < self.settings.max_retries {
            match self.update_once(item, path).await {
                Ok(()) => {
                    if self.settings.all_branches && !self.branches.mirror_branches(path).await {
                        warn!("Branch replication incomplete for {}", item.identifier());
                    }
                    return Ok(());
                }
                Err(SyncError::HealthCheck(_)) => {
                    warn!(
                        "Mirror of {} unhealthy after pull; recloning",
                        item.identifier()
                    );
                    remove_dir(path).await;
                    return self.clone_with_retry(item, path).await;
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "Update attempt {}/{} for {} failed: {}; retrying in {}s",
                        attempt + 1,
                        self.settings.max_retries,
                        item.identifier(),
                        e,
                        delay.as_secs()
                    );
                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }

        Err(exhausted(attempt, last_error))
    }

    async fn update_once(&self, item: &dyn MirrorItem, path: &Path) -> Result<(), SyncError> {
        self.git.fetch_all(path, self.settings.prune).await?;

        let branch = match self.git.current_branch(path).await {
            Some(branch) => branch,
            None => item
                .default_branch()
                .unwrap_or(crate::branches::FALLBACK_BRANCH)
                .to_string(),
        };
        self.git.pull(path, &branch).await?;

        if !self.health.is_healthy(path).await {
            return Err(SyncError::HealthCheck(path.to_path_buf()));
        }
        Ok(())
    }

    async fn count_branches(&self, path: &Path) -> usize {
        match self.git.local_branches(path).await {
            Ok(branches) => branches.len(),
            Err(e) => {
                debug!("Could not count branches in {}: {}", path.display(), e);
                0
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

fn exhausted(attempts: u32, last_error: Option<SyncError>) -> SyncError {
    SyncError::RetryExhausted {
        attempts,
        last: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts allowed".to_string()),
    }
}

async fn remove_dir(path: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(path).await {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}
