//! Mirror health verification
//!
//! A mirror is healthy when its `.git` metadata directory exists and `HEAD`
//! resolves to a commit. Interrupted clones fail the second condition.

use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::git::GitClient;

/// Upper bound for a single health probe
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HealthVerifier {
    git: GitClient,
}

impl HealthVerifier {
    pub fn new(git: GitClient) -> Self {
        Self { git }
    }

    /// Check whether `path` holds a structurally valid mirror
    pub async fn is_healthy(&self, path: &Path) -> bool {
        if !path.join(".git").exists() {
            debug!("No git metadata in {}", path.display());
            return false;
        }

        let timeout = HEALTH_TIMEOUT.min(self.git.timeout());
        let healthy = self.git.resolves_head(path, timeout).await;
        if !healthy {
            debug!("HEAD does not resolve in {}", path.display());
        }
        healthy
    }
}
