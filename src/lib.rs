//! repovault - Incremental GitHub Repository Mirroring
//!
//! repovault keeps a local mirror of every repository (and optionally every
//! gist) a GitHub account can see. Each run converges the mirror tree to the
//! remote set: missing mirrors are cloned, stale ones fast-forwarded, current
//! ones skipped. Transient git failures are retried with exponential backoff
//! and every mirror is health-checked after it is touched.
//!
//! ## Modules
//!
//! - [`sync`]: the per-item state machine and pass orchestration
//! - [`decider`]: absent / stale / current classification
//! - [`path_guard`]: confinement of remote-supplied names to the mirror root
//! - [`process`]: bounded-time command execution
//! - [`config`]: configuration management and parsing
//! - [`github`]: GitHub API integration and authentication

pub mod branches;
pub mod config;
pub mod decider;
pub mod discovery;
pub mod error;
pub mod git;
pub mod github;
pub mod health;
pub mod path_guard;
pub mod process;
pub mod progress;
pub mod stats;
pub mod sync;

pub use config::Config;
pub use decider::{Freshness, UpdateDecider};
pub use discovery::{Catalog, Discovery, GistInfo, MirrorItem, RepoInfo};
pub use error::SyncError;
pub use git::{Credential, GitClient};
pub use github::GitHubClient;
pub use health::HealthVerifier;
pub use process::{CommandOutput, CommandRunner, Invocation, TokioRunner};
pub use stats::{BackupStats, FailureStage};
pub use sync::{EngineSettings, SyncDecision, SyncEngine};
