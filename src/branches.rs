//! Replication of remote branches into local tracking branches

use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::git::GitClient;

/// Branch assumed checked out when the mirror cannot report one
pub const FALLBACK_BRANCH: &str = "main";

#[derive(Clone)]
pub struct BranchMirror {
    git: GitClient,
}

impl BranchMirror {
    pub fn new(git: GitClient) -> Self {
        Self { git }
    }

    /// Create a local tracking branch for every remote branch that lacks one.
    ///
    /// Best effort: a failed creation is logged and skipped. The originally
    /// checked-out branch is always restored. Returns `true` only when every
    /// step succeeded.
    pub async fn mirror_branches(&self, path: &Path) -> bool {
        let original = self
            .git
            .current_branch(path)
            .await
            .unwrap_or_else(|| FALLBACK_BRANCH.to_string());

        let mut complete = true;
        match self.create_missing(path).await {
            Ok(created) if created > 0 => {
                info!("Created {} tracking branches in {}", created, path.display())
            }
            Ok(_) => debug!("All remote branches already tracked in {}", path.display()),
            Err(_) => complete = false,
        }

        if let Err(e) = self.git.checkout(path, &original).await {
            warn!("Failed to restore branch {} in {}: {}", original, path.display(), e);
            complete = false;
        }

        complete
    }

    /// Returns the number of branches created, or the number of failures
    async fn create_missing(&self, path: &Path) -> Result<usize, usize> {
        let remote = match self.git.remote_branches(path).await {
            Ok(branches) => branches,
            Err(e) => {
                warn!("Failed to list remote branches in {}: {}", path.display(), e);
                return Err(1);
            }
        };
        let local: HashSet<String> = match self.git.local_branches(path).await {
            Ok(branches) => branches.into_iter().collect(),
            Err(e) => {
                warn!("Failed to list local branches in {}: {}", path.display(), e);
                return Err(1);
            }
        };

        let mut created = 0;
        let mut failures = 0;
        for branch in remote.iter().filter(|b| !local.contains(*b)) {
            match self.git.create_tracking_branch(path, branch).await {
                Ok(()) => created += 1,
                Err(e) => {
                    warn!("Failed to create tracking branch {}: {}", branch, e);
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            Err(failures)
        } else {
            Ok(created)
        }
    }
}
