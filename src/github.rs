use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use octocrab::models::gists::Gist;
use octocrab::models::Repository;
use octocrab::Octocrab;
use std::collections::HashSet;
use std::env;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::config::{Config, GitHubConfig};
use crate::discovery::{Catalog, Discovery, GistInfo, RepoInfo};
use crate::git::Credential;

/// Largest page size the REST API accepts
const PER_PAGE: u8 = 100;

/// GitHub client wrapper with authentication management
pub struct GitHubClient {
    client: Octocrab,
    username: String,
    token: String,
    settings: GitHubConfig,
}

/// GitHub authentication strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Use GitHub CLI authentication
    GitHubCLI,
    /// Use environment variable token
    EnvironmentToken,
}

/// A listed repository plus the metadata only the filters need
#[derive(Debug, Clone)]
pub struct RepoCandidate {
    pub info: RepoInfo,
    pub fork: bool,
}

impl GitHubClient {
    /// Create a new GitHub client with automatic authentication
    pub async fn new(config: &Config) -> Result<Self> {
        let (auth_strategy, token) = Self::detect_authentication(&config.github)?;

        info!("Using authentication strategy: {:?}", auth_strategy);

        let client = Octocrab::builder()
            .personal_token(token.clone())
            .build()
            .context("Failed to create GitHub client")?;

        let user = client
            .current()
            .user()
            .await
            .context("Failed to get current user information. Check your authentication.")?;

        let username = config
            .github
            .username
            .clone()
            .unwrap_or_else(|| user.login.clone());

        info!("Authenticated as GitHub user: {}", username);

        Ok(Self {
            client,
            username,
            token,
            settings: config.github.clone(),
        })
    }

    /// Detect and obtain GitHub authentication
    fn detect_authentication(github: &GitHubConfig) -> Result<(AuthStrategy, String)> {
        match github.auth_method.as_str() {
            "auto" => {
                // Try GitHub CLI first, then environment token
                if let Ok(token) = Self::try_github_cli() {
                    Ok((AuthStrategy::GitHubCLI, token))
                } else if let Ok(token) = Self::try_environment_token() {
                    Ok((AuthStrategy::EnvironmentToken, token))
                } else {
                    Err(anyhow!(
                        "No GitHub authentication found. Please either:\n\
                         1. Install and authenticate GitHub CLI: gh auth login\n\
                         2. Set GITHUB_TOKEN environment variable"
                    ))
                }
            }
            "gh_cli" => {
                let token = Self::try_github_cli()
                    .context("GitHub CLI authentication failed. Run: gh auth login")?;
                Ok((AuthStrategy::GitHubCLI, token))
            }
            "token" => {
                let token = Self::try_environment_token()
                    .context("GITHUB_TOKEN environment variable not found or invalid")?;
                Ok((AuthStrategy::EnvironmentToken, token))
            }
            other => Err(anyhow!("Unknown auth method: {}", other)),
        }
    }

    /// Try to get token from GitHub CLI
    fn try_github_cli() -> Result<String> {
        debug!("Attempting GitHub CLI authentication");

        if !is_command_available("gh") {
            return Err(anyhow!("GitHub CLI (gh) is not installed"));
        }

        let token_output = Command::new("gh")
            .args(["auth", "token"])
            .output()
            .context("Failed to get GitHub CLI token")?;

        if !token_output.status.success() {
            return Err(anyhow!(
                "GitHub CLI is not authenticated: {}",
                String::from_utf8_lossy(&token_output.stderr).trim()
            ));
        }

        let token = String::from_utf8(token_output.stdout)
            .context("GitHub CLI token is not valid UTF-8")?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(anyhow!("GitHub CLI returned empty token"));
        }

        debug!("Successfully obtained token from GitHub CLI");
        Ok(token)
    }

    /// Try to get token from environment variable
    fn try_environment_token() -> Result<String> {
        debug!("Attempting environment variable authentication");

        let token =
            env::var("GITHUB_TOKEN").context("GITHUB_TOKEN environment variable not set")?;

        if token.trim().is_empty() {
            return Err(anyhow!("GITHUB_TOKEN is empty"));
        }

        if !looks_like_github_token(&token) {
            warn!("GITHUB_TOKEN doesn't look like a GitHub token (expected a ghp_, gho_, ghs_ or github_pat_ prefix)");
        }

        Ok(token.trim().to_string())
    }

    /// Get the authenticated username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Token for authenticated clone URLs
    pub fn credential(&self) -> Credential {
        Credential::new(self.token.clone())
    }

    /// Every repository the authenticated user owns or collaborates on
    pub async fn list_user_repositories(&self) -> Result<Vec<Repository>> {
        debug!("Fetching user repositories for: {}", self.username);

        let first = self
            .client
            .current()
            .list_repos_for_authenticated_user()
            .per_page(PER_PAGE)
            .send()
            .await
            .context("Failed to fetch user repositories")?;
        let repositories = self
            .client
            .all_pages(first)
            .await
            .context("Failed to page through user repositories")?;

        info!("Found {} user repositories", repositories.len());
        Ok(repositories)
    }

    /// Logins of the organizations the user belongs to
    pub async fn list_user_organizations(&self) -> Result<Vec<String>> {
        debug!("Fetching organizations for user: {}", self.username);

        let first = self
            .client
            .current()
            .list_org_memberships_for_authenticated_user()
            .per_page(PER_PAGE)
            .send()
            .await
            .context("Failed to fetch user organizations")?;
        let memberships = self
            .client
            .all_pages(first)
            .await
            .context("Failed to page through organization memberships")?;

        let org_names: Vec<String> = memberships
            .into_iter()
            .map(|membership| membership.organization.login)
            .collect();

        info!("Found {} organizations: {:?}", org_names.len(), org_names);
        Ok(org_names)
    }

    pub async fn list_organization_repositories(&self, org: &str) -> Result<Vec<Repository>> {
        debug!("Fetching repositories for organization: {}", org);

        let first = self
            .client
            .orgs(org)
            .list_repos()
            .per_page(PER_PAGE)
            .send()
            .await
            .with_context(|| format!("Failed to fetch repositories for organization {}", org))?;
        let repositories = self
            .client
            .all_pages(first)
            .await
            .with_context(|| format!("Failed to page through repositories of {}", org))?;

        info!(
            "Found {} repositories for organization: {}",
            repositories.len(),
            org
        );
        Ok(repositories)
    }

    /// The authenticated user's gists
    pub async fn list_gists(&self) -> Result<Vec<GistInfo>> {
        debug!("Fetching gists for: {}", self.username);

        let first = self
            .client
            .current()
            .list_gists_for_authenticated_user()
            .per_page(PER_PAGE)
            .send()
            .await
            .context("Failed to fetch gists")?;
        let gists: Vec<Gist> = self
            .client
            .all_pages(first)
            .await
            .context("Failed to page through gists")?;

        info!("Found {} gists", gists.len());
        Ok(gists.into_iter().map(gist_info).collect())
    }

    /// Get all repositories (user + organizations) with filtering applied
    pub async fn get_all_repositories(&self) -> Result<Vec<RepoInfo>> {
        let mut all_repositories = self.list_user_repositories().await?;

        if self.settings.include_organizations {
            let organizations = self.list_user_organizations().await?;

            for org in organizations {
                match self.list_organization_repositories(&org).await {
                    Ok(org_repos) => all_repositories.extend(org_repos),
                    Err(e) => {
                        warn!("Failed to fetch repositories for organization {}: {}", org, e);
                        continue;
                    }
                }
            }
        }

        info!(
            "Total repositories before filtering: {}",
            all_repositories.len()
        );

        let candidates = all_repositories
            .into_iter()
            .filter_map(repo_candidate)
            .collect();
        let filtered = apply_filters(candidates, &self.settings);

        info!("Repositories after filtering: {}", filtered.len());

        Ok(filtered)
    }
}

#[async_trait]
impl Discovery for GitHubClient {
    async fn discover(&self, include_gists: bool) -> Result<Catalog> {
        let repositories = self.get_all_repositories().await?;
        let gists = if include_gists {
            self.list_gists().await?
        } else {
            Vec::new()
        };

        Ok(Catalog {
            login: self.username.clone(),
            repositories,
            gists,
        })
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}

/// Convert an API repository; entries without a clone URL are dropped
fn repo_candidate(repo: Repository) -> Option<RepoCandidate> {
    let Some(clone_url) = repo.clone_url else {
        warn!("Repository {} has no clone URL, skipping", repo.name);
        return None;
    };

    let full_name = repo.full_name.unwrap_or_else(|| match &repo.owner {
        Some(owner) => format!("{}/{}", owner.login, repo.name),
        None => repo.name.clone(),
    });

    Some(RepoCandidate {
        info: RepoInfo {
            name: repo.name,
            full_name,
            clone_url: clone_url.to_string(),
            default_branch: repo.default_branch,
            private: repo.private.unwrap_or(false),
            pushed_at: repo.pushed_at.map(|ts| ts.to_rfc3339()),
        },
        fork: repo.fork.unwrap_or(false),
    })
}

fn gist_info(gist: Gist) -> GistInfo {
    GistInfo {
        id: gist.id,
        description: gist.description,
        git_pull_url: gist.git_pull_url.to_string(),
        updated_at: Some(gist.updated_at.to_rfc3339()),
    }
}

/// Drop excluded and (optionally) forked repositories, then deduplicate by
/// `full_name` keeping the first occurrence
pub fn apply_filters(candidates: Vec<RepoCandidate>, settings: &GitHubConfig) -> Vec<RepoInfo> {
    let mut seen = HashSet::new();
    let mut filtered = Vec::new();

    for candidate in candidates {
        let repo = candidate.info;

        if matches_exclusion_pattern(&repo.name, &settings.exclude_patterns) {
            debug!("Excluding repository due to pattern match: {}", repo.name);
            continue;
        }

        if candidate.fork && !settings.include_forks {
            debug!("Excluding fork repository: {}", repo.full_name);
            continue;
        }

        if !seen.insert(repo.full_name.clone()) {
            debug!("Dropping duplicate listing of {}", repo.full_name);
            continue;
        }

        filtered.push(repo);
    }

    filtered
}

/// Check if repository name matches any exclusion pattern
fn matches_exclusion_pattern(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        // Simple glob pattern matching
        if pattern.contains('*') {
            let pattern_regex = regex::escape(pattern).replace(r"\*", ".*");

            regex::Regex::new(&format!("^{}$", pattern_regex))
                .map(|re| re.is_match(name))
                .unwrap_or(false)
        } else {
            name == pattern
        }
    })
}

fn looks_like_github_token(token: &str) -> bool {
    ["ghp_", "gho_", "ghs_", "ghu_", "github_pat_"]
        .iter()
        .any(|prefix| token.starts_with(prefix))
}

/// Check if a command is available in PATH
fn is_command_available(command: &str) -> bool {
    Command::new("which")
        .arg(command)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Utility functions for reporting authentication state
pub mod auth_setup {
    use super::*;

    /// Print how to make credentials available
    pub fn print_setup_guide() {
        if is_command_available("gh") {
            println!("✅ GitHub CLI (gh) is installed");
            println!("   Authenticate with: gh auth login");
        } else {
            println!("❌ GitHub CLI (gh) is not installed");

            #[cfg(target_os = "macos")]
            println!("   Install with: brew install gh");

            #[cfg(target_os = "linux")]
            println!("   See: https://github.com/cli/cli/blob/trunk/docs/install_linux.md");

            #[cfg(target_os = "windows")]
            println!("   Install with: winget install --id GitHub.cli");
        }
        println!();
        println!("Alternative: Set GITHUB_TOKEN environment variable");
        println!("   export GITHUB_TOKEN=your_token_here");
    }

    /// Test current authentication and report the login
    pub async fn auth_status(config: &Config) -> Result<()> {
        println!("🔍 Testing GitHub authentication...");

        match GitHubClient::new(config).await {
            Ok(client) => {
                println!("✅ Authentication successful");
                println!("   Username: {}", client.username());

                match client.list_user_organizations().await {
                    Ok(orgs) if orgs.is_empty() => println!("   Organizations: None"),
                    Ok(orgs) => println!("   Organizations: {}", orgs.join(", ")),
                    Err(e) => println!("⚠️  Could not list organizations: {}", e),
                }
                Ok(())
            }
            Err(e) => {
                println!("❌ Authentication failed: {}", e);
                println!();
                print_setup_guide();
                Err(e)
            }
        }
    }
}
