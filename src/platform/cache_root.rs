//! Cache-root providers: where the platform lets us keep purgeable, app-scoped data.

#![allow(missing_docs)]

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::config::Config;
use crate::core::errors::{Result, TdmError};

/// Application directory name appended to the per-user cache directory.
pub const APP_CACHE_DIR: &str = "telemetry_disk_manager";

/// Size of the filesystem that holds the cache root.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheCapacity {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl CacheCapacity {
    #[must_use]
    pub fn available_pct(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            (self.available_bytes as f64 * 100.0) / self.total_bytes as f64
        }
    }
}

/// Source of the platform cache root.
///
/// The returned directory is owned by the platform; callers only create and
/// delete paths beneath it.
pub trait CacheRootProvider: Send + Sync {
    /// Root cache directory. Assumed to exist and be writable.
    fn cache_dir(&self) -> PathBuf;

    /// Capacity of the filesystem holding [`Self::cache_dir`].
    fn capacity(&self) -> Result<CacheCapacity> {
        filesystem_capacity(&self.cache_dir())
    }
}

/// A cache root pinned to an explicit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedCacheRoot {
    path: PathBuf,
}

impl FixedCacheRoot {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CacheRootProvider for FixedCacheRoot {
    fn cache_dir(&self) -> PathBuf {
        self.path.clone()
    }
}

/// Per-user cache directory: `$XDG_CACHE_HOME/<app>` or `~/.cache/<app>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCacheRoot {
    path: PathBuf,
}

impl Default for PlatformCacheRoot {
    fn default() -> Self {
        Self::from_env(|name| env::var_os(name).map(PathBuf::from))
    }
}

impl PlatformCacheRoot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn from_env<F>(mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<PathBuf>,
    {
        let base = lookup("XDG_CACHE_HOME")
            .filter(|p| p.is_absolute())
            .or_else(|| lookup("HOME").map(|home| home.join(".cache")))
            .unwrap_or_else(|| {
                eprintln!("[TDM-PLATFORM] WARNING: HOME not set, falling back to /tmp for cache root");
                PathBuf::from("/tmp")
            });
        Self {
            path: base.join(APP_CACHE_DIR),
        }
    }
}

impl CacheRootProvider for PlatformCacheRoot {
    fn cache_dir(&self) -> PathBuf {
        self.path.clone()
    }
}

/// Build the provider described by `config.paths.cache_root`.
#[must_use]
pub fn provider_for(config: &Config) -> Arc<dyn CacheRootProvider> {
    match &config.paths.cache_root {
        Some(root) => Arc::new(FixedCacheRoot::new(root.clone())),
        None => Arc::new(PlatformCacheRoot::new()),
    }
}

/// Query `statvfs` for the filesystem holding `path`.
#[cfg(unix)]
pub fn filesystem_capacity(path: &Path) -> Result<CacheCapacity> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(|error| TdmError::FsStats {
        path: path.to_path_buf(),
        details: error.to_string(),
    })?;
    let fragment = stat.fragment_size();
    Ok(CacheCapacity {
        total_bytes: stat.blocks().saturating_mul(fragment),
        available_bytes: stat.blocks_available().saturating_mul(fragment),
    })
}

#[cfg(not(unix))]
pub fn filesystem_capacity(path: &Path) -> Result<CacheCapacity> {
    Err(TdmError::UnsupportedPlatform {
        details: format!("filesystem capacity is not supported for {}", path.display()),
    })
}
