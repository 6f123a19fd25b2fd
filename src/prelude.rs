//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use telemetry_disk_manager::prelude::*;
//! ```

// Core
pub use crate::core::config::{BufferingConfig, BufferingSettings, Config, SharedBufferingConfig};
pub use crate::core::errors::{Result, TdmError};
pub use crate::core::paths::{BufferLayout, SIGNAL_FOLDER_COUNT, SignalType};

// Disk
pub use crate::disk::manager::{DiskSpaceManager, MAX_FOLDER_SIZE_KEY, folder_budget};

// Platform
pub use crate::platform::cache_root::{
    CacheCapacity, CacheRootProvider, FixedCacheRoot, PlatformCacheRoot,
};

// Store
pub use crate::store::{JsonFileStore, KeyValueStore, MemoryStore};

// Logger
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
