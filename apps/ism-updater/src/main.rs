#![deny(clippy::pedantic)]

//! ism-updater - standalone update swap helper
//!
//! Spawned detached by the node when applying an update would overwrite the
//! running binary itself. Waits for the caller to exit, swaps the staged
//! archives into place, then brings the host back up. There is nobody left
//! to report back to, so every failure is logged and the process never
//! panics across `main`.

use clap::Parser;
use ism_archive::{ExtractOutcome, SafeExtractor};
use ism_install::spawn_detached;
use ism_types::{HostingType, RestartVerb, UpdaterInvocation};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Longest time to wait for the caller process to exit before swapping anyway
#[cfg(unix)]
const CALLER_EXIT_LIMIT: Duration = Duration::from_secs(60);

/// Poll interval while the caller is still alive
#[cfg(unix)]
const CALLER_POLL: Duration = Duration::from_millis(200);

/// Settle time where no caller pid can be watched
const GRACE_WAIT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "ism-updater")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Applies staged node updates after the host exits", long_about = None)]
struct Cli {
    /// RESTART, WIPENODE, START, or a ;:;-separated list of source archives
    action: String,

    /// Directory the archives unpack into and the host runs from
    target_dir: PathBuf,

    /// Caller as <pid>:<path> in swap form, or the bare host name in verb form
    caller: String,

    /// Hosting type code of the host (1=application, 2=service, 3=iis, 4=device)
    hosting_code: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.target_dir);

    let hosting = HostingType::from_code(cli.hosting_code);
    match RestartVerb::parse(&cli.action) {
        Some(verb) => run_verb(verb, &cli.target_dir, &cli.caller, hosting).await,
        None => run_swap(&cli, hosting).await,
    }
}

/// Log to a file beside the swapped files; the helper runs with its standard
/// streams detached, so stderr output would go nowhere.
fn init_tracing(target_dir: &Path) {
    let log_file = target_dir.join("ism-updater.log");
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
    {
        Ok(file) => {
            let _ = tracing_subscriber::fmt()
                .with_writer(file)
                .with_ansi(false)
                .with_env_filter(filter())
                .try_init();
        }
        Err(_) => {
            let _ = tracing_subscriber::fmt().with_env_filter(filter()).try_init();
        }
    }
}

/// Swap form: wait out the caller, extract every staged archive, relaunch.
async fn run_swap(cli: &Cli, hosting: HostingType) {
    let sources = UpdaterInvocation::split_source_list(&cli.action);
    if sources.is_empty() {
        warn!("no source archives in the argument list, nothing to do");
        return;
    }

    let (caller_pid, host_exe) = parse_caller(&cli.caller);
    if let Some(pid) = caller_pid {
        wait_for_exit(pid).await;
    } else {
        warn!(caller = %cli.caller, "caller is not <pid>:<path>, waiting a fixed grace period");
        tokio::time::sleep(GRACE_WAIT).await;
    }

    let extractor = SafeExtractor::new();
    let mut applied = 0_usize;
    for source in &sources {
        match extractor.extract(source, &cli.target_dir).await {
            Ok(ExtractOutcome::Completed { files_written, .. }) => {
                applied += 1;
                info!(source = %source.display(), files_written, "archive applied");
                mark_applied(&extractor, source).await;
            }
            Ok(ExtractOutcome::PartialFailure {
                files_written,
                failures,
            }) => {
                applied += 1;
                warn!(
                    source = %source.display(),
                    files_written,
                    failed = failures.len(),
                    "archive applied with failed entries"
                );
                mark_applied(&extractor, source).await;
            }
            // A rejected archive stays unmarked so the node can report it.
            Ok(ExtractOutcome::Suspicious { reason }) => {
                warn!(source = %source.display(), %reason, "archive rejected, leaving it in place");
            }
            Err(e) => {
                error!(source = %source.display(), error = %e, "extraction failed");
            }
        }
    }
    info!(applied, total = sources.len(), "swap finished");

    if host_exe.is_empty() {
        warn!("caller identity names no executable, not relaunching");
        return;
    }
    relaunch(Path::new(&host_exe), hosting).await;
}

/// Verb form: grace wait, optional cache wipe, relaunch the named host.
async fn run_verb(verb: RestartVerb, target_dir: &Path, host_name: &str, hosting: HostingType) {
    info!(%verb, target = %target_dir.display(), "relaunch requested");
    tokio::time::sleep(GRACE_WAIT).await;

    if verb == RestartVerb::WipeNode {
        wipe_cache(target_dir).await;
    }

    let exe = hosting
        .adjust_target_dir(target_dir)
        .join(host_file_name(host_name));
    relaunch(&exe, hosting).await;
}

async fn mark_applied(extractor: &SafeExtractor, source: &Path) {
    if let Err(e) = extractor.mark_applied(source).await {
        warn!(source = %source.display(), error = %e, "cannot mark archive applied");
    }
}

async fn wipe_cache(target_dir: &Path) {
    let cache = target_dir.join("cache");
    match tokio::fs::remove_dir_all(&cache).await {
        Ok(()) => info!(cache = %cache.display(), "cache directory cleared"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(cache = %cache.display(), error = %e, "cannot clear cache directory"),
    }
}

async fn relaunch(exe: &Path, hosting: HostingType) {
    match spawn_detached(exe, &[]).await {
        Ok(pid) => info!(host = %exe.display(), pid, %hosting, "host relaunched"),
        Err(e) => error!(host = %exe.display(), error = %e, "cannot relaunch host"),
    }
}

/// Split `<pid>:<path>` on the first colon only, so Windows drive letters in
/// the path survive.
fn parse_caller(caller: &str) -> (Option<u32>, String) {
    let mut parts = caller.splitn(2, ':');
    let pid = parts.next().and_then(|p| p.parse::<u32>().ok());
    let host = parts.next().unwrap_or_default().to_string();
    (pid, host)
}

fn host_file_name(host_name: &str) -> String {
    let suffix = std::env::consts::EXE_SUFFIX;
    if suffix.is_empty() || host_name.ends_with(suffix) {
        host_name.to_string()
    } else {
        format!("{host_name}{suffix}")
    }
}

#[cfg(unix)]
async fn wait_for_exit(pid: u32) {
    info!(pid, "waiting for the caller to exit");
    let start = std::time::Instant::now();
    while process_alive(pid) {
        if start.elapsed() >= CALLER_EXIT_LIMIT {
            warn!(
                pid,
                "caller still alive after {}s, swapping anyway",
                CALLER_EXIT_LIMIT.as_secs()
            );
            return;
        }
        tokio::time::sleep(CALLER_POLL).await;
    }
    info!(pid, "caller has exited");
}

#[cfg(not(unix))]
async fn wait_for_exit(pid: u32) {
    // No portable liveness probe; give the caller a fixed head start.
    info!(pid, "waiting a fixed grace period for the caller to exit");
    tokio::time::sleep(GRACE_WAIT).await;
}

/// Signal 0 probes for existence without delivering anything.
#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_splits_on_the_first_colon_only() {
        let (pid, host) = parse_caller("4242:/opt/node/ismd");
        assert_eq!(pid, Some(4242));
        assert_eq!(host, "/opt/node/ismd");

        let (pid, host) = parse_caller(r"77:C:\node\ismd.exe");
        assert_eq!(pid, Some(77));
        assert_eq!(host, r"C:\node\ismd.exe");
    }

    #[test]
    fn malformed_callers_yield_no_pid() {
        assert_eq!(parse_caller("ismd").0, None);
        assert_eq!(parse_caller("notapid:/opt/ismd").0, None);
        assert_eq!(parse_caller("").0, None);
    }

    #[test]
    fn host_file_name_appends_the_platform_suffix_once() {
        let name = host_file_name("ismd");
        assert_eq!(name, format!("ismd{}", std::env::consts::EXE_SUFFIX));
        assert_eq!(host_file_name(&name), name);
    }
}
