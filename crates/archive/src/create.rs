//! Backup archive creation

use ism_errors::{ArchiveError, Error};
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::task;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

/// Zip a directory tree into `dest_file`, returning the archive size
///
/// The archive is written to a sibling `.partial` path and renamed into
/// place once complete, so a failed or interrupted run never leaves a
/// half-written archive under the destination name. An existing archive at
/// `dest_file` is replaced.
///
/// # Errors
///
/// Returns an error if the source tree cannot be read or the archive cannot
/// be written; the `.partial` file is removed in that case.
pub async fn create_archive(source_dir: &Path, dest_file: &Path) -> Result<u64, Error> {
    let source = source_dir.to_path_buf();
    let dest = dest_file.to_path_buf();

    task::spawn_blocking(move || {
        let mut partial = dest.as_os_str().to_owned();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        match write_zip(&source, &partial) {
            Ok(()) => {
                std::fs::rename(&partial, &dest).map_err(|e| {
                    let _ = std::fs::remove_file(&partial);
                    ArchiveError::CreateFailed {
                        message: format!("cannot move archive into place: {e}"),
                    }
                })?;
                let size = std::fs::metadata(&dest)
                    .map_err(|e| Error::io_with_path(&e, &dest))?
                    .len();
                Ok(size)
            }
            Err(e) => {
                let _ = std::fs::remove_file(&partial);
                Err(e)
            }
        }
    })
    .await
    .map_err(|e| ArchiveError::TaskFailed {
        message: e.to_string(),
    })?
}

fn write_zip(source: &Path, partial: &Path) -> Result<(), Error> {
    if let Some(parent) = partial.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
    }

    let out = File::create(partial).map_err(|e| ArchiveError::CreateFailed {
        message: format!("cannot create {}: {e}", partial.display()),
    })?;
    let mut writer = zip::ZipWriter::new(out);

    for entry in WalkDir::new(source)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let name = relative.to_string_lossy().replace('\\', "/");

        let mut options = SimpleFileOptions::default();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(meta) = entry.metadata() {
                options = options.unix_permissions(meta.permissions().mode());
            }
        }

        if entry.file_type().is_dir() {
            writer
                .add_directory(name, options)
                .map_err(|e| ArchiveError::CreateFailed {
                    message: e.to_string(),
                })?;
        } else if entry.file_type().is_file() {
            writer
                .start_file(name, options)
                .map_err(|e| ArchiveError::CreateFailed {
                    message: e.to_string(),
                })?;
            let mut input =
                File::open(entry.path()).map_err(|e| Error::io_with_path(&e, entry.path()))?;
            std::io::copy(&mut input, &mut writer).map_err(|e| ArchiveError::CreateFailed {
                message: format!("cannot archive {}: {e}", entry.path().display()),
            })?;
        }
    }

    writer.finish().map_err(|e| ArchiveError::CreateFailed {
        message: e.to_string(),
    })?;
    Ok(())
}
