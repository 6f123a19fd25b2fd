//! Disk-space manager for the telemetry buffer.
//!
//! Owns three decisions:
//! - where buffered signals and scratch files live under the cache root,
//! - that scratch content never outlives the manager instance that saw it,
//! - how many bytes each signal-type folder may use.
//!
//! The folder budget is computed once from the configured cache size and
//! persisted. After that the durable store is authoritative: a later change
//! to the configuration does not move an already persisted budget.
//!
//! # Pure vs effectful accessors
//!
//! [`DiskSpaceManager::signals_buffer_path`], [`DiskSpaceManager::temporary_path`]
//! and [`DiskSpaceManager::signal_dir`] only derive paths. The `*_dir`
//! accessors create directories and, for the temp directory, purge it.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::config::{BufferingConfig, Config, SharedBufferingConfig};
use crate::core::errors::{Result, TdmError};
use crate::core::paths::{BufferLayout, SIGNAL_FOLDER_COUNT, SignalType};
use crate::disk::cleanup::{ensure_dir, purge_and_recreate};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::platform::cache_root::{CacheCapacity, CacheRootProvider, provider_for};
use crate::store::{JsonFileStore, KeyValueStore};

/// Store key holding the persisted per-folder budget in bytes.
pub const MAX_FOLDER_SIZE_KEY: &str = "max_signal_folder_size";

/// Read default meaning "nothing persisted".
const ABSENT: i64 = -1;

/// Resolves buffer directories and the per-signal folder budget.
pub struct DiskSpaceManager {
    cache_root: Arc<dyn CacheRootProvider>,
    store: Arc<dyn KeyValueStore>,
    config: Arc<dyn BufferingConfig>,
    logger: Option<ActivityLoggerHandle>,
    temp_cleaned: Mutex<bool>,
    budget_lock: Mutex<()>,
}

impl DiskSpaceManager {
    pub fn new(
        cache_root: Arc<dyn CacheRootProvider>,
        store: Arc<dyn KeyValueStore>,
        config: Arc<dyn BufferingConfig>,
        logger: Option<ActivityLoggerHandle>,
    ) -> Self {
        Self {
            cache_root,
            store,
            config,
            logger,
            temp_cleaned: Mutex::new(false),
            budget_lock: Mutex::new(()),
        }
    }

    /// Manager wired from a loaded [`Config`]: configured or platform cache
    /// root and a [`JsonFileStore`] at `paths.preferences_file`.
    ///
    /// Buffering values come from `buffering`, so a caller that keeps a clone
    /// of it can push refreshed settings with [`SharedBufferingConfig::update`].
    #[must_use]
    pub fn from_config(
        config: &Config,
        buffering: SharedBufferingConfig,
        logger: Option<ActivityLoggerHandle>,
    ) -> Self {
        let manager = Self::new(
            provider_for(config),
            Arc::new(JsonFileStore::new(&config.paths.preferences_file)),
            Arc::new(buffering),
            logger,
        );
        if let Ok(hash) = config.stable_hash() {
            manager.emit(ActivityEvent::ManagerStarted {
                cache_root: manager.cache_root.cache_dir(),
                config_hash: hash,
            });
        }
        manager
    }

    /// Buffer layout under the provider's current cache root.
    #[must_use]
    pub fn layout(&self) -> BufferLayout {
        BufferLayout::new(self.cache_root.cache_dir())
    }

    /// Size and free space of the filesystem holding the cache root.
    pub fn capacity(&self) -> Result<CacheCapacity> {
        self.cache_root.capacity()
    }

    /// `<cache root>/opentelemetry/signals`. No filesystem access.
    #[must_use]
    pub fn signals_buffer_path(&self) -> PathBuf {
        self.layout().signals_dir()
    }

    /// `<cache root>/opentelemetry/temp`. No filesystem access.
    #[must_use]
    pub fn temporary_path(&self) -> PathBuf {
        self.layout().temp_dir()
    }

    /// Folder for one signal type under the signals buffer. Not created here.
    #[must_use]
    pub fn signal_dir(&self, kind: SignalType) -> PathBuf {
        self.layout().signal_dir(kind)
    }

    /// Signals buffer directory, created (with parents) if missing.
    pub fn signals_buffer_dir(&self) -> Result<PathBuf> {
        let path = self.signals_buffer_path();
        if ensure_dir(&path).map_err(|e| self.report(e))? {
            self.emit(ActivityEvent::DirectoryCreated { path: path.clone() });
        }
        Ok(path)
    }

    /// Temp directory. The first successful call on this instance empties it;
    /// later calls only make sure it exists.
    pub fn temporary_dir(&self) -> Result<PathBuf> {
        let path = self.temporary_path();
        let mut cleaned = self.temp_cleaned.lock();

        if *cleaned {
            if ensure_dir(&path).map_err(|e| self.report(e))? {
                self.emit(ActivityEvent::DirectoryCreated { path: path.clone() });
            }
            return Ok(path);
        }

        let report = purge_and_recreate(&path).map_err(|e| self.report(e))?;
        *cleaned = true;
        self.emit(ActivityEvent::TempDirPurged {
            path: path.clone(),
            entries_removed: report.entries_removed,
            duration_ms: report.duration_ms,
        });
        Ok(path)
    }

    /// Whether this instance has already purged its temp directory.
    #[must_use]
    pub fn temp_cleaned(&self) -> bool {
        *self.temp_cleaned.lock()
    }

    /// Maximum size of one buffered file. Read from the configuration on every call.
    #[must_use]
    pub fn max_cache_file_size(&self) -> u64 {
        self.config.max_cache_file_size()
    }

    /// Byte budget for each signal-type folder.
    ///
    /// A persisted value is returned as-is without consulting the
    /// configuration or the cache root. Otherwise `max_cache_size / 3` is
    /// computed, persisted, and returned. If that write fails the error
    /// carries the computed value (see [`TdmError::computed_budget`]).
    pub fn max_folder_size(&self) -> Result<u64> {
        let _guard = self.budget_lock.lock();

        if let Some(stored) = self.persisted_folder_size()? {
            return Ok(stored);
        }

        let max_cache_size = self.config.max_cache_size();
        let budget = folder_budget(max_cache_size);
        let stored = i64::try_from(budget).map_err(|_| {
            TdmError::persistence(MAX_FOLDER_SIZE_KEY, "budget exceeds the store's integer range")
                .with_computed(budget)
        })?;

        if let Err(e) = self.store.set_int(MAX_FOLDER_SIZE_KEY, stored) {
            return Err(self.report(e.with_computed(budget)));
        }
        self.emit(ActivityEvent::FolderBudgetComputed {
            bytes: budget,
            max_cache_size,
        });
        Ok(budget)
    }

    /// The persisted budget, if any. Negative values count as absent.
    pub fn persisted_folder_size(&self) -> Result<Option<u64>> {
        let raw = self
            .store
            .get_int(MAX_FOLDER_SIZE_KEY, ABSENT)
            .map_err(|e| self.report(e))?;
        Ok(u64::try_from(raw).ok())
    }

    /// Forget the persisted budget so the next [`Self::max_folder_size`]
    /// recomputes it from the current configuration.
    pub fn reset_folder_size(&self) -> Result<()> {
        let _guard = self.budget_lock.lock();
        self.store
            .remove(MAX_FOLDER_SIZE_KEY)
            .map_err(|e| self.report(e))?;
        self.emit(ActivityEvent::FolderBudgetReset {
            key: MAX_FOLDER_SIZE_KEY.to_string(),
        });
        Ok(())
    }

    fn emit(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }

    fn report(&self, err: TdmError) -> TdmError {
        self.emit(ActivityEvent::from_error(&err));
        err
    }
}

/// Equal share of `max_cache_size` for each signal folder, truncated.
#[must_use]
pub const fn folder_budget(max_cache_size: u64) -> u64 {
    max_cache_size / SIGNAL_FOLDER_COUNT
}
