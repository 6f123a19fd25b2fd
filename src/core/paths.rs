//! Buffer directory layout under the cache root, plus shared path helpers.

#![allow(missing_docs)]

use std::env;
use std::path::{Component, Path, PathBuf};

/// Directory under the cache root that owns everything this crate manages.
pub const OTEL_DIR: &str = "opentelemetry";
/// Persistent signal buffers, one subfolder per signal type.
pub const SIGNALS_DIR: &str = "signals";
/// Scratch space for write-then-rename artifacts.
pub const TEMP_DIR: &str = "temp";

/// Signal categories that each get their own buffer folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalType {
    Spans,
    Metrics,
    Logs,
}

impl SignalType {
    /// Every supported signal type, in folder order.
    pub const ALL: [Self; 3] = [Self::Spans, Self::Metrics, Self::Logs];

    /// Folder name under the signals buffer directory.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Spans => "spans",
            Self::Metrics => "metrics",
            Self::Logs => "logs",
        }
    }
}

/// Number of signal-type folders sharing the total cache budget.
///
/// Persisted budgets are not recomputed when this changes.
pub const SIGNAL_FOLDER_COUNT: u64 = SignalType::ALL.len() as u64;

/// Pure path derivation for the buffer layout. Never touches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferLayout {
    root: PathBuf,
}

impl BufferLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root this layout hangs off.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/opentelemetry/signals`
    #[must_use]
    pub fn signals_dir(&self) -> PathBuf {
        self.root.join(OTEL_DIR).join(SIGNALS_DIR)
    }

    /// `<root>/opentelemetry/temp`
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(OTEL_DIR).join(TEMP_DIR)
    }

    /// `<root>/opentelemetry/signals/<kind>`
    #[must_use]
    pub fn signal_dir(&self, kind: SignalType) -> PathBuf {
        self.signals_dir().join(kind.dir_name())
    }
}

/// Resolve a path to an absolute, normalized path.
///
/// Existing paths are canonicalized (symlinks resolved). Missing paths are made
/// absolute relative to CWD and `..`/`.` components are resolved syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    normalize_syntactic(&absolute)
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}
