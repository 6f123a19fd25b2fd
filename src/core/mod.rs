//! Core types: errors, configuration, buffer layout.

pub mod config;
pub mod errors;
pub mod paths;
