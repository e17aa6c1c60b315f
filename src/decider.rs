//! Freshness classification for existing mirrors
//!
//! Timestamps are compared first because the check is free; the remote tip
//! probe only runs when the remote push is newer than the tolerance window.

use std::path::Path;
use tracing::{debug, warn};

use crate::discovery::MirrorItem;
use crate::git::{parse_timestamp, GitClient};
use crate::health::HealthVerifier;

/// Default allowance for push events recorded after the commit's own time
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No usable mirror: missing, unhealthy, or unreadable tip
    Absent,
    /// Mirror exists but lags behind the remote
    Stale,
    /// Mirror matches the remote
    Current,
}

#[derive(Clone)]
pub struct UpdateDecider {
    git: GitClient,
    health: HealthVerifier,
    tolerance_secs: i64,
    probe_remote_tip: bool,
}

impl UpdateDecider {
    pub fn new(git: GitClient, tolerance_secs: i64, probe_remote_tip: bool) -> Self {
        Self {
            health: HealthVerifier::new(git.clone()),
            git,
            tolerance_secs,
            probe_remote_tip,
        }
    }

    pub async fn decide(&self, path: &Path, item: &dyn MirrorItem) -> Freshness {
        if !path.exists() || !self.health.is_healthy(path).await {
            return Freshness::Absent;
        }

        let Some(local_time) = self.git.head_commit_time(path).await else {
            debug!("Unreadable tip commit time in {}", path.display());
            return Freshness::Absent;
        };

        let Some(raw) = item.pushed_at() else {
            return Freshness::Stale;
        };
        let Some(pushed_at) = parse_timestamp(raw) else {
            warn!("Unparsable push timestamp {:?} for {}", raw, item.identifier());
            return Freshness::Stale;
        };

        let diff = (pushed_at - local_time).num_seconds();
        if diff <= self.tolerance_secs {
            return Freshness::Current;
        }

        if self.probe_remote_tip && self.tips_match(path).await {
            debug!(
                "{} pushed {}s after local tip but revisions match",
                item.identifier(),
                diff
            );
            return Freshness::Current;
        }

        Freshness::Stale
    }

    async fn tips_match(&self, path: &Path) -> bool {
        let Some(remote) = self.git.remote_head_revision(path).await else {
            return false;
        };
        match self.git.head_revision(path).await {
            Some(local) => local == remote,
            None => false,
        }
    }
}
