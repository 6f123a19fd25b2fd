//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TdmError};
use crate::core::paths::resolve_absolute_path;

/// Read-only view of the disk-buffering limits.
///
/// Values may change between calls (remote config), so consumers must not cache them.
pub trait BufferingConfig: Send + Sync {
    /// Desired maximum total cache size, in bytes.
    fn max_cache_size(&self) -> u64;
    /// Maximum size of a single persisted buffer file, in bytes.
    fn max_cache_file_size(&self) -> u64;
}

/// Full TDM configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub buffering: BufferingSettings,
    pub paths: PathsConfig,
    pub logging: LoggingConfig,
}

/// Disk-buffering limits as configured by the application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BufferingSettings {
    /// Master switch; when false callers should skip disk buffering entirely.
    pub enabled: bool,
    pub max_cache_size: u64,
    pub max_cache_file_size: u64,
}

/// Filesystem paths used by tdm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// Explicit cache root. `None` resolves the per-user platform cache directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_root: Option<PathBuf>,
    pub preferences_file: PathBuf,
    pub activity_log: PathBuf,
}

/// Activity log rotation knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Second activity log file, used while `paths.activity_log` is unwritable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_path: Option<PathBuf>,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
    pub fsync_interval_secs: u64,
}

impl Default for BufferingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_cache_size: 60 * 1024 * 1024,
            max_cache_file_size: 1024 * 1024,
        }
    }
}

impl BufferingConfig for BufferingSettings {
    fn max_cache_size(&self) -> u64 {
        self.max_cache_size
    }

    fn max_cache_file_size(&self) -> u64 {
        self.max_cache_file_size
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data = data_dir();
        Self {
            config_file: config_dir().join("config.toml"),
            cache_root: None,
            preferences_file: data.join("preferences.json"),
            activity_log: data.join("activity.jsonl"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            fallback_path: None,
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 10,
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[TDM-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn config_dir() -> PathBuf {
    home_dir().join(".config").join("tdm")
}

fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("tdm")
}

/// Buffering limits shared with a live configuration source.
///
/// Cloning shares the same underlying settings, so an update through one
/// handle is visible to every reader on its next call.
#[derive(Debug, Clone, Default)]
pub struct SharedBufferingConfig {
    inner: Arc<RwLock<BufferingSettings>>,
}

impl SharedBufferingConfig {
    #[must_use]
    pub fn new(settings: BufferingSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Snapshot of the current settings.
    #[must_use]
    pub fn snapshot(&self) -> BufferingSettings {
        *self.inner.read()
    }

    /// Replace the settings, e.g. after a remote config refresh.
    pub fn update(&self, settings: BufferingSettings) {
        *self.inner.write() = settings;
    }
}

impl BufferingConfig for SharedBufferingConfig {
    fn max_cache_size(&self) -> u64 {
        self.inner.read().max_cache_size
    }

    fn max_cache_file_size(&self) -> u64 {
        self.inner.read().max_cache_file_size
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| TdmError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(TdmError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic FNV-1a hash of the effective config for logging.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("TDM_BUFFERING_ENABLED") {
            self.buffering.enabled = parse_env_bool("TDM_BUFFERING_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("TDM_BUFFERING_MAX_CACHE_SIZE") {
            self.buffering.max_cache_size = parse_env_u64("TDM_BUFFERING_MAX_CACHE_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("TDM_BUFFERING_MAX_CACHE_FILE_SIZE") {
            self.buffering.max_cache_file_size =
                parse_env_u64("TDM_BUFFERING_MAX_CACHE_FILE_SIZE", &raw)?;
        }

        if let Some(raw) = lookup("TDM_CACHE_ROOT") {
            self.paths.cache_root = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("TDM_PREFERENCES_FILE") {
            self.paths.preferences_file = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("TDM_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        if let Some(raw) = lookup("TDM_LOG_FALLBACK_PATH") {
            self.logging.fallback_path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("TDM_LOG_MAX_SIZE_BYTES") {
            self.logging.max_size_bytes = parse_env_u64("TDM_LOG_MAX_SIZE_BYTES", &raw)?;
        }

        Ok(())
    }

    fn normalize_paths(&mut self) {
        if let Some(root) = &self.paths.cache_root {
            self.paths.cache_root = Some(resolve_absolute_path(root));
        }
        self.paths.preferences_file = resolve_absolute_path(&self.paths.preferences_file);
        self.paths.activity_log = resolve_absolute_path(&self.paths.activity_log);
        if let Some(fallback) = &self.logging.fallback_path {
            self.logging.fallback_path = Some(resolve_absolute_path(fallback));
        }
    }

    fn validate(&self) -> Result<()> {
        if self.buffering.max_cache_size == 0 {
            return Err(TdmError::InvalidConfig {
                details: "buffering.max_cache_size must be > 0".to_string(),
            });
        }
        if self.buffering.max_cache_file_size == 0 {
            return Err(TdmError::InvalidConfig {
                details: "buffering.max_cache_file_size must be > 0".to_string(),
            });
        }
        if self.logging.max_rotated_files == 0 {
            return Err(TdmError::InvalidConfig {
                details: "logging.max_rotated_files must be >= 1".to_string(),
            });
        }
        if self.paths.cache_root.as_deref() == Some(Path::new("/")) {
            return Err(TdmError::InvalidConfig {
                details: "paths.cache_root must not be the filesystem root".to_string(),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|error| TdmError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim()
        .parse::<bool>()
        .map_err(|error| TdmError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
