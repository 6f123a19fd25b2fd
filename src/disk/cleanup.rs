//! Directory creation and temp purging.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;

use crate::core::errors::{Result, TdmError};

/// Outcome of a successful purge-and-recreate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    /// Top-level entries that were present before the purge.
    pub entries_removed: u64,
    pub duration_ms: u64,
}

/// Create `path` and any missing parents.
///
/// Returns `true` when the directory did not exist before. A non-directory
/// occupying the path is `DirectoryUnavailable`.
pub fn ensure_dir(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => return Ok(false),
        Ok(_) => {
            return Err(TdmError::directory(
                path,
                io::Error::new(io::ErrorKind::AlreadyExists, "path exists and is not a directory"),
            ));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(TdmError::directory(path, e)),
    }
    fs::create_dir_all(path).map_err(|source| TdmError::directory(path, source))?;
    Ok(true)
}

/// Delete everything at `path` (hidden entries and nested trees included),
/// then recreate it empty.
///
/// A missing path is purged trivially. A file at `path` is removed and
/// replaced by a directory.
pub fn purge_and_recreate(path: &Path) -> Result<PurgeReport> {
    let started = Instant::now();
    let cleanup_err = |source: io::Error| TdmError::CleanupFailure {
        path: path.to_path_buf(),
        source,
    };

    let entries_removed = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {
            let count = fs::read_dir(path).map_err(cleanup_err)?.count() as u64;
            fs::remove_dir_all(path).map_err(cleanup_err)?;
            count
        }
        Ok(_) => {
            fs::remove_file(path).map_err(cleanup_err)?;
            1
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
        Err(e) => return Err(cleanup_err(e)),
    };

    fs::create_dir_all(path).map_err(|source| TdmError::directory(path, source))?;

    Ok(PurgeReport {
        entries_removed,
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    })
}
