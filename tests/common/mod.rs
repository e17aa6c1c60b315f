//! Common test utilities and helpers for repovault tests

#![allow(dead_code)]

use async_trait::async_trait;
use repovault::progress::{ProgressEvent, ProgressSink};
use repovault::{CommandOutput, CommandRunner, Invocation, RepoInfo, SyncError, TokioRunner};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Scratch directories for one test: an origin area and a mirror root
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub origins: PathBuf,
    pub mirror_root: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let origins = temp_dir.path().join("origins");
        let mirror_root = temp_dir.path().join("mirror");
        std::fs::create_dir_all(&origins).expect("Failed to create origins dir");

        Self {
            temp_dir,
            origins,
            mirror_root,
        }
    }

    /// Create a non-bare origin repository on `main` with one commit at `date`
    pub fn create_origin(&self, name: &str, date: &str) -> PathBuf {
        let path = self.origins.join(name);
        std::fs::create_dir_all(&path).expect("Failed to create origin dir");
        git(&path, &["init", "-q", "-b", "main"], None);
        commit_file(&path, "README.md", "initial\n", date);
        path
    }

    /// Path of the mirror the engine creates for `repo`
    pub fn mirror_path(&self, repo: &RepoInfo) -> PathBuf {
        self.mirror_root.join(repo.full_name.replace('/', "_"))
    }
}

/// Run git in `dir`, panicking on failure; commit dates pinned when given
pub fn git(dir: &Path, args: &[&str], date: Option<&str>) -> String {
    let mut command = Command::new("git");
    command
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir);
    if let Some(date) = date {
        command
            .env("GIT_AUTHOR_DATE", date)
            .env("GIT_COMMITTER_DATE", date);
    }

    let output = command.output().expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn commit_file(repo: &Path, file: &str, content: &str, date: &str) {
    std::fs::write(repo.join(file), content).expect("Failed to write file");
    git(repo, &["add", file], None);
    git(repo, &["commit", "-q", "-m", file], Some(date));
}

pub fn head_of(repo: &Path) -> String {
    git(repo, &["rev-parse", "HEAD"], None)
}

/// Catalog entry pointing at a local origin
pub fn repo_info(owner: &str, name: &str, origin: &Path, pushed_at: Option<&str>) -> RepoInfo {
    RepoInfo {
        name: name.to_string(),
        full_name: format!("{}/{}", owner, name),
        clone_url: origin.to_string_lossy().into_owned(),
        default_branch: Some("main".to_string()),
        private: false,
        pushed_at: pushed_at.map(str::to_string),
    }
}

type Handler = dyn Fn(&Invocation) -> Result<CommandOutput, SyncError> + Send + Sync;

/// Runner answering every command from a closure and recording what ran
pub struct ScriptedRunner {
    handler: Box<Handler>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&Invocation) -> Result<CommandOutput, SyncError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded invocations of a git subcommand
    pub fn count(&self, subcommand: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|inv| inv.subcommand() == Some(subcommand))
            .count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, SyncError> {
        self.calls.lock().unwrap().push(invocation.clone());
        (self.handler)(invocation)
    }
}

/// Real runner that also records every invocation
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
}

impl RecordingRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self, subcommand: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|inv| inv.subcommand() == Some(subcommand))
            .count()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, SyncError> {
        self.calls.lock().unwrap().push(invocation.clone());
        TokioRunner.run(invocation).await
    }
}

pub fn ok(stdout: &str) -> Result<CommandOutput, SyncError> {
    Ok(CommandOutput {
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

pub fn exit(code: i32, stderr: &str) -> Result<CommandOutput, SyncError> {
    Ok(CommandOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    })
}

/// Clone target argument of a `git clone` invocation
pub fn clone_target(invocation: &Invocation) -> PathBuf {
    PathBuf::from(invocation.args.last().expect("clone without target"))
}

/// Simulate a successful clone by creating the metadata directory
pub fn fake_clone(invocation: &Invocation) -> Result<CommandOutput, SyncError> {
    std::fs::create_dir_all(clone_target(invocation).join(".git"))?;
    ok("")
}

/// Progress sink that keeps every event
#[derive(Clone, Default)]
pub struct RecordingProgress {
    pub events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingProgress {
    pub fn labels(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.label.clone())
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_item(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
