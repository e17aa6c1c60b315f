//! Error taxonomy for the synchronization engine
//!
//! Application layers (config, GitHub API, CLI) use `anyhow`; everything the
//! engine classifies for retry purposes goes through [`SyncError`].

use std::path::PathBuf;
use std::time::Duration;

/// Failures raised while mirroring a single item
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// An untrusted name would resolve outside the mirror root
    #[error("refusing {name:?}: resolves outside {}", .root.display())]
    PathTraversal { name: String, root: PathBuf },

    #[error("`{command}` timed out after {}s", .after.as_secs())]
    TimedOut { command: String, after: Duration },

    #[error("`{command}` exited with {}: {stderr}", exit_label(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command succeeded but the mirror is structurally invalid
    #[error("mirror at {} failed health verification", .0.display())]
    HealthCheck(PathBuf),

    #[error("gave up after {attempts} attempt(s): {last}")]
    RetryExhausted { attempts: u32, last: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

impl SyncError {
    /// Whether the retry loop should try the same operation again
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::TimedOut { .. }
                | SyncError::CommandFailed { .. }
                | SyncError::HealthCheck(_)
        )
    }
}
