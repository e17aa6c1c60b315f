//! Catalog model and discovery abstraction
//!
//! The engine mirrors anything implementing [`MirrorItem`]. Repositories and
//! gists are the two kinds the GitHub catalog produces.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity and metadata of one remote repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    /// Short repository name (e.g., "Hello-World")
    pub name: String,

    /// Unique owner-qualified name (e.g., "octocat/Hello-World")
    pub full_name: String,

    /// HTTPS clone URL
    pub clone_url: String,

    pub default_branch: Option<String>,

    pub private: bool,

    /// Remote last-push timestamp (ISO-8601)
    pub pushed_at: Option<String>,
}

/// A gist as listed by the hosting API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistInfo {
    pub id: String,
    pub description: Option<String>,
    pub git_pull_url: String,

    /// Last update timestamp (ISO-8601); gists expose no push time
    pub updated_at: Option<String>,
}

/// What the sync engine needs to know about a catalog entry
pub trait MirrorItem: Send + Sync {
    /// Identifier used in logs and failure reports
    fn identifier(&self) -> &str;

    /// Untrusted directory name for the local mirror, checked by the path guard
    fn local_name(&self) -> String;

    fn remote_url(&self) -> &str;

    /// Timestamp of the last remote change, if the catalog provides one
    fn pushed_at(&self) -> Option<&str>;

    fn default_branch(&self) -> Option<&str> {
        None
    }
}

impl MirrorItem for RepoInfo {
    fn identifier(&self) -> &str {
        &self.full_name
    }

    /// `owner/repo` becomes `owner_repo` so org repositories never collide
    fn local_name(&self) -> String {
        self.full_name.replace('/', "_")
    }

    fn remote_url(&self) -> &str {
        &self.clone_url
    }

    fn pushed_at(&self) -> Option<&str> {
        self.pushed_at.as_deref()
    }

    fn default_branch(&self) -> Option<&str> {
        self.default_branch.as_deref()
    }
}

impl MirrorItem for GistInfo {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn local_name(&self) -> String {
        self.id.clone()
    }

    fn remote_url(&self) -> &str {
        &self.git_pull_url
    }

    fn pushed_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }
}

/// Everything a discovery source found for one account
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub login: String,
    pub repositories: Vec<RepoInfo>,
    pub gists: Vec<GistInfo>,
}

/// Trait for catalog discovery from a hosting provider
#[async_trait]
pub trait Discovery: Send + Sync {
    /// List repositories, and gists when `include_gists` is set
    async fn discover(&self, include_gists: bool) -> Result<Catalog>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}
