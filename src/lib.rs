#![forbid(unsafe_code)]

//! Telemetry disk manager (tdm): on-device disk space for a telemetry buffer.
//!
//! Decides three things for the buffering subsystem:
//! 1. **Layout**: where signal buffers and scratch files live under the platform cache root
//! 2. **Temp hygiene**: scratch content is purged once per manager lifetime
//! 3. **Folder budget**: the per-signal-type byte budget, computed once and persisted
//!
//! # Library usage
//!
//! ```rust,no_run
//! use telemetry_disk_manager::prelude::*;
//!
//! let config = Config::load(None)?;
//! let buffering = SharedBufferingConfig::new(config.buffering);
//! let manager = DiskSpaceManager::from_config(&config, buffering.clone(), None);
//! let signals = manager.signals_buffer_dir()?;
//! let budget = manager.max_folder_size()?;
//!
//! // A remote refresh is visible to the next call.
//! buffering.update(BufferingSettings { max_cache_file_size: 512 * 1024, ..buffering.snapshot() });
//! assert_eq!(manager.max_cache_file_size(), 512 * 1024);
//! # Ok::<(), TdmError>(())
//! ```

pub mod prelude;

pub mod core;
pub mod disk;
pub mod logger;
pub mod platform;
pub mod store;
