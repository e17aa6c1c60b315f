use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repovault::config::SyncConfig;
use repovault::github::auth_setup;
use repovault::progress::{BarProgress, LogProgress, NoProgress, ProgressSink};
use repovault::{
    BackupStats, CommandRunner, Config, Discovery, EngineSettings, GitHubClient, MirrorItem,
    SyncEngine, TokioRunner,
};

/// Failed items listed in the summary before truncating
const FAILED_PREVIEW_LIMIT: usize = 3;

#[derive(Parser)]
#[command(name = "repovault")]
#[command(about = "Incremental mirror of your GitHub repositories and gists")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging, one line per item instead of a progress bar
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file
    Init {
        /// Root directory for all mirrors
        #[arg(short, long, default_value = "~/repovault")]
        mirror_root: String,
    },

    /// Manage authentication
    Auth {
        #[command(subcommand)]
        auth_command: AuthCommands,
    },

    /// Mirror repositories (and optionally gists) into the mirror root
    Sync {
        #[command(flatten)]
        overrides: SyncOverrides,

        /// Skip the repository pass
        #[arg(long)]
        no_repos: bool,

        /// Print the final statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// List catalog items and the action the next sync would take
    List {
        /// Include gists
        #[arg(long)]
        gists: bool,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Show authentication status
    Status,
}

#[derive(Args, Debug, Default)]
struct SyncOverrides {
    /// Timeout per git command in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Attempts per clone or update
    #[arg(long)]
    max_retries: Option<u32>,

    /// Do not create local tracking branches for remote branches
    #[arg(long)]
    no_branches: bool,

    /// Also mirror gists
    #[arg(long)]
    gists: bool,
}

impl SyncOverrides {
    fn apply(&self, sync: &mut SyncConfig) {
        if let Some(timeout) = self.timeout {
            sync.timeout = timeout;
        }
        if let Some(max_retries) = self.max_retries {
            sync.max_retries = max_retries;
        }
        if self.no_branches {
            sync.all_branches = false;
        }
        if self.gists {
            sync.gists = true;
        }
    }
}

/// Machine-readable result of `repovault sync --json`
#[derive(Serialize)]
struct SyncReport {
    login: String,
    repositories: Option<BackupStats>,
    gists: Option<BackupStats>,
}

impl SyncReport {
    fn any_failed(&self) -> bool {
        [&self.repositories, &self.gists]
            .into_iter()
            .flatten()
            .any(|stats| stats.failed > 0)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let creating = matches!(&cli.command, Commands::Init { .. });
    let config = load_config(cli.config.as_deref(), creating)?;

    let quiet = matches!(&cli.command, Commands::Sync { .. }) && !cli.verbose;
    init_logging(cli.verbose, quiet, &config.logging.level)?;
    info!("Starting repovault v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Init { mirror_root } => cmd_init(mirror_root, cli.config.as_deref(), &config),
        Commands::Auth { auth_command } => cmd_auth(auth_command, &config).await,
        Commands::Sync {
            overrides,
            no_repos,
            json,
        } => cmd_sync(&overrides, no_repos, json, cli.verbose, config).await,
        Commands::List { gists } => cmd_list(gists, &config).await,
    }
}

/// Initialize logging; `RUST_LOG` always wins
fn init_logging(verbose: bool, quiet: bool, level: &str) -> Result<()> {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        level
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Load configuration from specified path or default location.
///
/// `init` may name a file that does not exist yet.
fn load_config(config_path: Option<&Path>, allow_missing: bool) -> Result<Config> {
    match config_path {
        Some(path) if allow_missing && !path.exists() => Ok(Config::default()),
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Write a configuration file pointing at `mirror_root`
fn cmd_init(mirror_root: String, config_path: Option<&Path>, config: &Config) -> Result<()> {
    let expanded = shellexpand::full(&mirror_root)
        .context("Failed to expand mirror root")?
        .into_owned();
    std::fs::create_dir_all(&expanded)
        .with_context(|| format!("Failed to create mirror root {}", expanded))?;

    let mut new_config = config.clone();
    new_config.mirror_root = mirror_root;

    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::default_config_path()?,
    };
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }
    new_config.save(&config_path)?;

    println!("✅ repovault initialized");
    println!("   Config: {}", config_path.display());
    println!("   Mirror root: {}", expanded);
    println!("   Next: run 'repovault auth status', then 'repovault sync'");

    Ok(())
}

async fn cmd_auth(auth_command: AuthCommands, config: &Config) -> Result<()> {
    match auth_command {
        AuthCommands::Status => auth_setup::auth_status(config).await,
    }
}

async fn cmd_sync(
    overrides: &SyncOverrides,
    no_repos: bool,
    json: bool,
    verbose: bool,
    mut config: Config,
) -> Result<()> {
    overrides.apply(&mut config.sync);

    let client = GitHubClient::new(&config).await?;

    if !json {
        println!("🔍 Discovering repositories...");
    }
    let catalog = client
        .discover(config.sync.gists)
        .await
        .context("Failed to discover catalog")?;
    if !json {
        println!(
            "   Found {} repositories and {} gists for {}",
            catalog.repositories.len(),
            catalog.gists.len(),
            catalog.login
        );
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(TokioRunner);
    let settings = EngineSettings::from(&config.sync);
    let cancel = Arc::new(AtomicBool::new(false));
    let engine = |label: &str| {
        let progress: Box<dyn ProgressSink> = if json {
            Box::new(NoProgress)
        } else if verbose {
            Box::new(LogProgress)
        } else {
            println!("\n🔄 Mirroring {}", label);
            Box::new(BarProgress::new())
        };
        SyncEngine::new(settings.clone(), runner.clone())
            .with_credential(client.credential())
            .with_progress(progress)
            .with_cancel_flag(cancel.clone())
    };

    let passes = async {
        let repositories = if no_repos {
            None
        } else {
            let root = config.repositories_dir(&catalog.login);
            Some(engine("repositories").process(&root, &catalog.repositories).await)
        };
        let gists = if config.sync.gists {
            let root = config.gists_dir(&catalog.login);
            Some(engine("gists").process(&root, &catalog.gists).await)
        } else {
            None
        };
        SyncReport {
            login: catalog.login.clone(),
            repositories,
            gists,
        }
    };

    let report = tokio::select! {
        report = passes => report,
        _ = tokio::signal::ctrl_c() => {
            cancel.store(true, Ordering::SeqCst);
            eprintln!("\n🛑 Interrupted; partially written mirrors are recloned next run");
            return Err(anyhow!("Sync interrupted"));
        }
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        if let Some(stats) = &report.repositories {
            print_summary("Repositories", stats);
        }
        if let Some(stats) = &report.gists {
            print_summary("Gists", stats);
        }
    }

    if report.any_failed() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(title: &str, stats: &BackupStats) {
    println!("\n🎉 {} pass complete", title);
    println!("   📊 Total: {}", stats.total);
    println!("   📥 Cloned: {}", stats.cloned);
    println!("   🔄 Updated: {}", stats.updated);
    println!("   ⏭️  Skipped: {}", stats.skipped);
    println!("   ❌ Failed: {}", stats.failed);
    println!("   🌿 Branches: {}", stats.total_branches);
    println!("   ⏱️  Duration: {}", stats.elapsed_display());

    if stats.failed > 0 {
        println!("   Failed items: {}", stats.failed_preview(FAILED_PREVIEW_LIMIT));
    }
}

/// List catalog items and what the next sync would do with each
async fn cmd_list(include_gists: bool, config: &Config) -> Result<()> {
    let client = GitHubClient::new(config).await?;
    let catalog = client.discover(include_gists).await?;

    let runner: Arc<dyn CommandRunner> = Arc::new(TokioRunner);
    let engine = SyncEngine::new(EngineSettings::from(&config.sync), runner);

    println!("Repositories ({}):", catalog.repositories.len());
    let root = config.repositories_dir(&catalog.login);
    for repo in &catalog.repositories {
        print_plan(&engine, &root, repo).await;
    }

    if include_gists {
        println!("\nGists ({}):", catalog.gists.len());
        let root = config.gists_dir(&catalog.login);
        for gist in &catalog.gists {
            print_plan(&engine, &root, gist).await;
        }
    }

    Ok(())
}

async fn print_plan(engine: &SyncEngine, root: &Path, item: &dyn MirrorItem) {
    match engine.plan(root, item).await {
        Ok(decision) => println!(
            "  {:<5} {} -> {}",
            decision.label(),
            item.identifier(),
            root.join(item.local_name()).display()
        ),
        Err(e) => println!("  ❌    {}: {}", item.identifier(), e),
    }
}
