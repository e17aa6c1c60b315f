//! External command execution
//!
//! Every git invocation in the crate goes through a [`CommandRunner`]. The
//! production runner is [`TokioRunner`]; tests substitute scripted runners.

use async_trait::async_trait;
use reqwest::Url;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use crate::error::SyncError;

/// A fully specified external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout,
        }
    }

    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// First argument, i.e. the git subcommand
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Renders the command line with URL passwords replaced by `***`
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", redact_url(arg))?;
        }
        Ok(())
    }
}

/// Captured result of a command that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Convert a non-zero exit into [`SyncError::CommandFailed`]
    pub fn into_result(self, invocation: &Invocation) -> Result<CommandOutput, SyncError> {
        if self.success() {
            Ok(self)
        } else {
            Err(SyncError::CommandFailed {
                command: invocation.to_string(),
                code: self.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion or until its timeout elapses.
    ///
    /// A non-zero exit is returned as `Ok` with the code recorded; only
    /// timeouts and launch failures are errors.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, SyncError>;
}

/// Runs commands as tokio child processes, killing them on timeout or drop
#[derive(Debug, Default, Clone)]
pub struct TokioRunner;

#[async_trait]
impl CommandRunner for TokioRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, SyncError> {
        match &invocation.cwd {
            Some(dir) => debug!("Running in {}: {}", dir.display(), invocation),
            None => debug!("Running: {}", invocation),
        }

        let mut command = AsyncCommand::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|source| SyncError::Spawn {
            command: invocation.to_string(),
            source,
        })?;

        // Dropping the wait future on timeout drops the child, which kills it
        match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(CommandOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(SyncError::Io(e)),
            Err(_) => Err(SyncError::TimedOut {
                command: invocation.to_string(),
                after: invocation.timeout,
            }),
        }
    }
}

/// Replace the password component of a URL-looking argument with `***`
pub fn redact_url(arg: &str) -> String {
    match Url::parse(arg) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        _ => arg.to_string(),
    }
}
