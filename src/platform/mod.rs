//! Platform integration: the cache root and its filesystem capacity.

pub mod cache_root;
