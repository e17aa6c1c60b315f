use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::decider::DEFAULT_TOLERANCE_SECS;

/// Main configuration structure for repovault
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Root directory for all mirrors; per-account trees live below it
    #[serde(default = "default_mirror_root")]
    pub mirror_root: String,

    /// GitHub authentication and discovery settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// Authentication method
    #[serde(default = "default_auth_method")]
    pub auth_method: String, // "auto", "gh_cli", "token"

    /// GitHub username (auto-detected if null)
    pub username: Option<String>,

    /// Include organization repositories
    #[serde(default = "default_true")]
    pub include_organizations: bool,

    /// Repository exclusion patterns
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Include forked repositories
    #[serde(default = "default_true")]
    pub include_forks: bool,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SyncConfig {
    /// Timeout for each git command in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Attempts per clone or update before an item is marked failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Materialize every remote branch as a local tracking branch
    #[serde(default = "default_true")]
    pub all_branches: bool,

    /// Prune stale remote refs and tags when fetching
    #[serde(default = "default_true")]
    pub prune: bool,

    /// Seconds a remote push may lead the local tip and still count as current
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: i64,

    /// Confirm timestamp skew with `git ls-remote` before updating
    #[serde(default = "default_true")]
    pub probe_remote_tip: bool,

    /// Mirror gists as well as repositories
    #[serde(default)]
    pub gists: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

// Default value functions
fn default_mirror_root() -> String {
    "${HOME}/repovault".to_string()
}
fn default_auth_method() -> String {
    "auto".to_string()
}
fn default_true() -> bool {
    true
}
fn default_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}
fn default_tolerance_secs() -> i64 {
    DEFAULT_TOLERANCE_SECS
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            auth_method: default_auth_method(),
            username: None,
            include_organizations: default_true(),
            exclude_patterns: Vec::new(),
            include_forks: default_true(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            all_branches: default_true(),
            prune: default_true(),
            tolerance_secs: default_tolerance_secs(),
            probe_remote_tip: default_true(),
            gists: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let mut config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;
            tracing::info!("Created default configuration at: {:?}", config_path);

            config.expand_paths()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("repovault").join("config.yml"))
    }

    /// Expand `~` and environment variables in the mirror root
    pub fn expand_paths(&mut self) -> Result<()> {
        self.mirror_root = shellexpand::full(&self.mirror_root)
            .context("Failed to expand mirror_root path")?
            .into_owned();

        Ok(())
    }

    /// Directory holding every mirror for `login`
    pub fn account_dir(&self, login: &str) -> PathBuf {
        PathBuf::from(&self.mirror_root).join(login)
    }

    pub fn repositories_dir(&self, login: &str) -> PathBuf {
        self.account_dir(login).join("repositories")
    }

    pub fn gists_dir(&self, login: &str) -> PathBuf {
        self.account_dir(login).join("gists")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mirror_root: default_mirror_root(),
            github: GitHubConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    // Helper function to create a temporary config directory
    fn setup_test_config_dir() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_dir = temp_dir.path().join("repovault");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");
        (temp_dir, config_dir)
    }

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert_eq!(config.mirror_root, "${HOME}/repovault");
        assert!(config.github.include_organizations);
        assert!(config.github.include_forks);
        assert_eq!(config.sync.timeout, 30);
        assert_eq!(config.sync.max_retries, 5);
        assert!(config.sync.all_branches);
        assert!(config.sync.prune);
        assert_eq!(config.sync.tolerance_secs, 300);
        assert!(config.sync.probe_remote_tip);
        assert!(!config.sync.gists);
    }

    #[test]
    #[serial]
    fn test_expand_paths() {
        env::set_var("TEST_REPOVAULT_HOME", "/test/home");

        let mut config = Config::default();
        config.mirror_root = "${TEST_REPOVAULT_HOME}/mirrors".to_string();

        config.expand_paths().expect("Failed to expand paths");

        assert_eq!(config.mirror_root, "/test/home/mirrors");

        env::remove_var("TEST_REPOVAULT_HOME");
    }

    #[test]
    fn test_account_layout() {
        let mut config = Config::default();
        config.mirror_root = "/srv/backup".to_string();

        assert_eq!(
            config.repositories_dir("octocat"),
            PathBuf::from("/srv/backup/octocat/repositories")
        );
        assert_eq!(
            config.gists_dir("octocat"),
            PathBuf::from("/srv/backup/octocat/gists")
        );
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let nonexistent_path = Path::new("/nonexistent/path/config.yml");
        let result = Config::load(nonexistent_path);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let (_temp_dir, config_dir) = setup_test_config_dir();
        let config_path = config_dir.join("config.yml");

        let mut config = Config::default();
        config.mirror_root = "/custom/path".to_string();
        config.github.username = Some("testuser".to_string());
        config.sync.max_retries = 2;
        config.sync.gists = true;

        config.save(&config_path).expect("Failed to save config");

        let loaded_config = Config::load(&config_path).expect("Failed to load config");

        assert_eq!(loaded_config.mirror_root, "/custom/path");
        assert_eq!(loaded_config.github.username, Some("testuser".to_string()));
        assert_eq!(loaded_config.sync.max_retries, 2);
        assert!(loaded_config.sync.gists);
    }

    #[test]
    fn test_config_default_path_xdg() {
        let default_path = Config::default_config_path().expect("Failed to get default path");
        assert!(default_path.to_string_lossy().contains("repovault"));
        assert!(default_path.to_string_lossy().ends_with("config.yml"));
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml_content = r#"
mirror_root: "/data/mirrors"
github:
  auth_method: "token"
  username: "testuser"
  include_organizations: false
  include_forks: false
  exclude_patterns:
    - "archived-*"
sync:
  timeout: 120
  max_retries: 3
  all_branches: false
  prune: false
  tolerance_secs: 30
  probe_remote_tip: false
  gists: true
logging:
  level: "debug"
"#;

        let config: Config = serde_yaml::from_str(yaml_content).expect("Failed to parse YAML");

        assert_eq!(config.mirror_root, "/data/mirrors");
        assert_eq!(config.github.auth_method, "token");
        assert!(!config.github.include_organizations);
        assert!(!config.github.include_forks);
        assert_eq!(config.github.exclude_patterns, vec!["archived-*".to_string()]);
        assert_eq!(config.sync.timeout, 120);
        assert_eq!(config.sync.max_retries, 3);
        assert!(!config.sync.all_branches);
        assert!(!config.sync.prune);
        assert_eq!(config.sync.tolerance_secs, 30);
        assert!(!config.sync.probe_remote_tip);
        assert!(config.sync.gists);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_yaml_partial_sync_section_uses_defaults() {
        let config: Config =
            serde_yaml::from_str("sync:\n  max_retries: 1\n").expect("Failed to parse YAML");
        assert_eq!(config.mirror_root, "${HOME}/repovault");
        assert_eq!(config.sync.max_retries, 1);
        assert_eq!(config.sync.timeout, 30);
        assert!(config.sync.all_branches);
    }
}
