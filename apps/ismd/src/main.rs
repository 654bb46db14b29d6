#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! ismd - update lifecycle daemon for mesh nodes
//!
//! Runs the scan and backup timers, talks to a provisioning peer when one is
//! configured, and applies accepted updates. Besides daemon mode the binary
//! doubles as the operator CLI for one-shot scans, backups and restores, and
//! accepts the relaunch verbs a previous instance hands over when it
//! restarts or wipes itself.

mod daemon;
mod trust;

use clap::{Parser, Subcommand};
use ism_backup::{BackupOutcome, RestoreOutcome};
use ism_config::Config;
use ism_errors::Error;
use ism_install::{LaunchOutcome, ShutdownHook};
use ism_lifecycle::UpdateManager;
use ism_types::RestartVerb;
use std::path::PathBuf;
use std::process;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "ismd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Update lifecycle daemon for mesh edge nodes", long_about = None)]
struct Cli {
    /// Path to ismd.toml; defaults to the one in the working directory
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the configured base directory
    #[arg(long, global = true, value_name = "DIR")]
    base_dir: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG still wins)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daemon: timers, provisioning, command dispatch
    Run,

    /// Scan the update folders once and report what would be installed
    Scan {
        /// Extract the accepted archives in place after scanning
        #[arg(long)]
        apply: bool,
    },

    /// Back up the cache folder now
    Backup {
        /// Archive title; a timestamped name when omitted
        title: Option<String>,
    },

    /// Restore the cache folder from a named backup
    Restore {
        /// Archive title written at backup time
        title: String,
    },
}

#[tokio::main]
async fn main() {
    // Relaunch verbs come from a previous instance or the swap helper, not
    // from an operator, and bypass the subcommand grammar.
    let raw: Vec<String> = std::env::args().skip(1).collect();
    if let Some((verb, target_dir, service_name, hosting_code)) = parse_relaunch(&raw) {
        init_tracing(false);
        daemon::run_relaunch(verb, target_dir, service_name, hosting_code).await;
        return;
    }

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("fatal: {e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let mut config = Config::load_or_default(cli.config.as_deref()).await?;
    config.merge_env()?;
    if let Some(base) = cli.base_dir {
        config.paths.base_dir = base;
    }

    match cli.command {
        Commands::Run => daemon::run(config).await,
        Commands::Scan { apply } => run_scan(&config, apply).await,
        Commands::Backup { title } => run_backup(&config, title).await,
        Commands::Restore { title } => run_restore(&config, &title).await,
    }
}

fn parse_relaunch(args: &[String]) -> Option<(RestartVerb, PathBuf, String, u8)> {
    if args.len() != 4 {
        return None;
    }
    let verb = RestartVerb::parse(&args[0])?;
    let code = args[3].parse().unwrap_or(1);
    Some((verb, PathBuf::from(&args[1]), args[2].clone(), code))
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// One-shot commands never restart anything, so the hook has nothing to do.
struct NoShutdown;

impl ShutdownHook for NoShutdown {
    fn request_shutdown(&self, _hard: bool) {}
}

async fn run_scan(config: &Config, apply: bool) -> Result<(), Error> {
    let (manager, bridge) = daemon::build_manager(config)?;

    let result = scan_once(&manager, apply).await;

    drop(manager);
    let _ = bridge.await;
    result
}

async fn scan_once(manager: &UpdateManager, apply: bool) -> Result<(), Error> {
    let Some(updates) = manager.scan_for_updates(false).await else {
        println!("no updates available");
        return Ok(());
    };

    for candidate in updates.candidates() {
        println!(
            "{} V{}  ({})",
            candidate.service_name,
            candidate.version,
            candidate.path.display()
        );
    }
    if !apply {
        return Ok(());
    }

    match manager.launch_updater(false, &NoShutdown).await {
        LaunchOutcome::Completed { sources_applied } => {
            println!("applied {sources_applied} update archives");
            Ok(())
        }
        other => Err(Error::internal(format!("install failed: {other:?}"))),
    }
}

async fn run_backup(config: &Config, title: Option<String>) -> Result<(), Error> {
    let title = title.unwrap_or_else(|| {
        format!(
            "{}-{}",
            config.node.service_name,
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        )
    });

    let (manager, bridge) = daemon::build_manager(config)?;
    let outcome = manager.backup_cache_folder(&title).await;
    drop(manager);
    let _ = bridge.await;

    match outcome {
        BackupOutcome::Completed(definition) => {
            println!(
                "backup written: {} ({} bytes)",
                definition.file_path.display(),
                definition.size_bytes
            );
            Ok(())
        }
        other => Err(Error::internal(format!("backup failed: {other:?}"))),
    }
}

async fn run_restore(config: &Config, title: &str) -> Result<(), Error> {
    let (manager, bridge) = daemon::build_manager(config)?;
    let outcome = manager.restore_cache_folder(title).await;

    let result = match outcome {
        RestoreOutcome::Completed { files_restored } => {
            println!(
                "restored {files_restored} files into {}",
                config.cache_dir().display()
            );
            Ok(())
        }
        RestoreOutcome::NotFound => {
            let known = manager.list_backups().await;
            if known.is_empty() {
                eprintln!("no backup named '{title}' and no archives on disk");
            } else {
                let titles: Vec<&str> = known.iter().map(|d| d.title.as_str()).collect();
                eprintln!("no backup named '{title}'; available: {}", titles.join(", "));
            }
            Err(Error::internal(format!("backup not found: {title}")))
        }
        other => Err(Error::internal(format!("restore failed: {other:?}"))),
    };

    drop(manager);
    let _ = bridge.await;
    result
}
