//! TDM-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, TdmError>;

/// Top-level error type for the telemetry disk manager.
#[derive(Debug, Error)]
pub enum TdmError {
    #[error("[TDM-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[TDM-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[TDM-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[TDM-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[TDM-2001] directory unavailable at {path}: {source}")]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[TDM-2002] temp cleanup failed at {path}: {source}")]
    CleanupFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[TDM-2003] filesystem stats failure for {path}: {details}")]
    FsStats { path: PathBuf, details: String },

    #[error("[TDM-2101] persistence failure for key {key}: {details}")]
    PersistenceFailure {
        key: String,
        details: String,
        /// Budget computed before the failing write, if any.
        computed: Option<u64>,
    },

    #[error("[TDM-2102] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[TDM-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[TDM-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl TdmError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "TDM-1001",
            Self::MissingConfig { .. } => "TDM-1002",
            Self::ConfigParse { .. } => "TDM-1003",
            Self::UnsupportedPlatform { .. } => "TDM-1101",
            Self::DirectoryUnavailable { .. } => "TDM-2001",
            Self::CleanupFailure { .. } => "TDM-2002",
            Self::FsStats { .. } => "TDM-2003",
            Self::PersistenceFailure { .. } => "TDM-2101",
            Self::Serialization { .. } => "TDM-2102",
            Self::Io { .. } => "TDM-3002",
            Self::Runtime { .. } => "TDM-3900",
        }
    }

    /// Whether the caller should bypass disk buffering for the rest of the session.
    ///
    /// A persistence failure that still carries a computed budget leaves
    /// buffering usable for the current process.
    #[must_use]
    pub const fn disables_buffering(&self) -> bool {
        match self {
            Self::DirectoryUnavailable { .. } | Self::CleanupFailure { .. } => true,
            Self::PersistenceFailure { computed, .. } => computed.is_none(),
            _ => false,
        }
    }

    /// Budget that was computed before a persistence write failed.
    #[must_use]
    pub const fn computed_budget(&self) -> Option<u64> {
        match self {
            Self::PersistenceFailure { computed, .. } => *computed,
            _ => None,
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for directory creation failures.
    #[must_use]
    pub fn directory(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::DirectoryUnavailable {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for store failures before any value was computed.
    #[must_use]
    pub fn persistence(key: &str, details: impl Into<String>) -> Self {
        Self::PersistenceFailure {
            key: key.to_string(),
            details: details.into(),
            computed: None,
        }
    }

    /// Attach the computed budget to a persistence failure. Other kinds pass through.
    #[must_use]
    pub fn with_computed(self, value: u64) -> Self {
        match self {
            Self::PersistenceFailure { key, details, .. } => Self::PersistenceFailure {
                key,
                details,
                computed: Some(value),
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for TdmError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for TdmError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
