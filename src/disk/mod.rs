//! Buffer directory management and the per-signal folder budget.

pub mod cleanup;
pub mod manager;

pub use manager::{DiskSpaceManager, MAX_FOLDER_SIZE_KEY};
