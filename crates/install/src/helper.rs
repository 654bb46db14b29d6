//! Helper binary materialization and detached spawning

use ism_errors::{Error, InstallError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// File name of the standalone updater helper, shipped beside the daemon
pub const HELPER_BINARY: &str = "ism-updater";

/// Copy the updater helper next to the files it will swap
///
/// The helper has to run from outside the daemon's own binary directory on
/// hosts where the running binary gets replaced. It is copied into
/// `target_dir`, falling back to the system temp directory when the target
/// is not writable.
///
/// # Errors
///
/// Returns an error if the helper cannot be found beside the current
/// executable or cannot be copied anywhere.
pub async fn materialize_helper(target_dir: &Path) -> Result<PathBuf, Error> {
    let exe = std::env::current_exe().map_err(|e| InstallError::UpdaterUnavailable {
        message: format!("cannot resolve current executable: {e}"),
    })?;
    let helper_name = format!("{HELPER_BINARY}{}", std::env::consts::EXE_SUFFIX);
    let source = exe
        .parent()
        .ok_or_else(|| InstallError::UpdaterUnavailable {
            message: "current executable has no parent directory".to_string(),
        })?
        .join(&helper_name);
    if !source.exists() {
        return Err(InstallError::UpdaterUnavailable {
            message: format!("{} not found", source.display()),
        }
        .into());
    }

    let preferred = target_dir.join(&helper_name);
    if tokio::fs::copy(&source, &preferred).await.is_ok() {
        return Ok(preferred);
    }

    let fallback = std::env::temp_dir().join(&helper_name);
    tokio::fs::copy(&source, &fallback)
        .await
        .map_err(|e| InstallError::UpdaterUnavailable {
            message: format!("cannot copy helper to {}: {e}", fallback.display()),
        })?;
    Ok(fallback)
}

/// Spawn a process that keeps running after this one exits
///
/// Standard streams are detached and, on unix, the child gets its own
/// process group so terminal signals aimed at the daemon do not reach it.
///
/// # Errors
///
/// Returns an error if the process cannot be spawned.
pub async fn spawn_detached(program: &Path, args: &[OsString]) -> Result<u32, Error> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    command.process_group(0);

    let child = command.spawn().map_err(|e| InstallError::SpawnFailed {
        program: program.display().to_string(),
        message: e.to_string(),
    })?;

    Ok(child.id().unwrap_or_default())
}
