//! Activity logger thread.
//!
//! One dedicated thread owns the [`JsonlWriter`]. Everything else sends
//! [`ActivityEvent`]s over a bounded crossbeam channel with `try_send`, so a
//! slow disk under the log never stalls directory or budget resolution.
//! A writer that degraded off its primary file retries it before each event.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::config::Config;
use crate::core::errors::{Result, TdmError};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

const CHANNEL_CAPACITY: usize = 256;

/// Something worth recording about the buffer directories or the folder budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    ManagerStarted {
        cache_root: PathBuf,
        config_hash: String,
    },
    DirectoryCreated {
        path: PathBuf,
    },
    TempDirPurged {
        path: PathBuf,
        entries_removed: u64,
        duration_ms: u64,
    },
    FolderBudgetComputed {
        bytes: u64,
        max_cache_size: u64,
    },
    FolderBudgetReset {
        key: String,
    },
    PersistenceFailed {
        key: String,
        code: String,
        message: String,
    },
    Error {
        code: String,
        message: String,
    },
    /// Flush and stop the logger thread.
    Shutdown,
}

impl ActivityEvent {
    /// Error event carrying the code and message of `err`.
    #[must_use]
    pub fn from_error(err: &TdmError) -> Self {
        match err {
            TdmError::PersistenceFailure { key, .. } => Self::PersistenceFailed {
                key: key.clone(),
                code: err.code().to_string(),
                message: err.to_string(),
            },
            _ => Self::Error {
                code: err.code().to_string(),
                message: err.to_string(),
            },
        }
    }
}

/// Cloneable sender side of the logger.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Queue an event. Never blocks; a full channel drops the event and counts it.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Events lost to back-pressure and not yet reported in the log.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit. Join the thread to wait for it.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }

    /// A handle whose receiver is already gone. Sends are silently discarded.
    #[must_use]
    pub fn disconnected() -> Self {
        let (tx, _) = bounded(1);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A handle paired with its raw receiver, for asserting on emitted events.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, Receiver<ActivityEvent>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }
}

/// Options for the logger thread.
#[derive(Debug, Clone)]
pub struct ActivityLoggerConfig {
    pub jsonl: JsonlConfig,
    pub channel_capacity: usize,
}

impl Default for ActivityLoggerConfig {
    fn default() -> Self {
        Self {
            jsonl: JsonlConfig::default(),
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

impl ActivityLoggerConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            jsonl: JsonlConfig::from_config(config),
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

/// Start the logger thread.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (handle, rx) = ActivityLoggerHandle::channel(config.channel_capacity.max(1));
    let dropped = Arc::clone(&handle.dropped_events);
    let jsonl = config.jsonl;

    let join = thread::Builder::new()
        .name("tdm-logger".to_string())
        .spawn(move || run(&rx, jsonl, &dropped))
        .map_err(|e| TdmError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn run(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);

    while let Ok(event) = rx.recv() {
        let lost = dropped.swap(0, Ordering::Relaxed);
        if lost > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.entries = Some(lost);
            warn.details = Some(format!("{lost} activity events dropped under back-pressure"));
            jsonl.write_entry(&warn);
        }

        if event == ActivityEvent::Shutdown {
            break;
        }
        jsonl.try_recover();
        if let Some(entry) = event_to_log_entry(&event) {
            jsonl.write_entry(&entry);
        }
    }

    jsonl.flush();
    jsonl.fsync();
}

fn display(path: &Path) -> Option<String> {
    Some(path.display().to_string())
}

/// JSONL representation of `event`. `Shutdown` has none.
#[must_use]
pub fn event_to_log_entry(event: &ActivityEvent) -> Option<LogEntry> {
    let entry = match event {
        ActivityEvent::ManagerStarted {
            cache_root,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::ManagerStart, Severity::Info);
            e.path = display(cache_root);
            e.details = Some(format!(
                "version={} config_hash={config_hash}",
                env!("CARGO_PKG_VERSION")
            ));
            e.ok = Some(true);
            e
        }
        ActivityEvent::DirectoryCreated { path } => {
            let mut e = LogEntry::new(EventType::DirectoryCreate, Severity::Info);
            e.path = display(path);
            e.ok = Some(true);
            e
        }
        ActivityEvent::TempDirPurged {
            path,
            entries_removed,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::TempPurge, Severity::Info);
            e.path = display(path);
            e.entries = Some(*entries_removed);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::FolderBudgetComputed {
            bytes,
            max_cache_size,
        } => {
            let mut e = LogEntry::new(EventType::BudgetCompute, Severity::Info);
            e.bytes = Some(*bytes);
            e.details = Some(format!("max_cache_size={max_cache_size}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::FolderBudgetReset { key } => {
            let mut e = LogEntry::new(EventType::BudgetReset, Severity::Info);
            e.key = Some(key.clone());
            e.ok = Some(true);
            e
        }
        ActivityEvent::PersistenceFailed { key, code, message } => {
            let mut e = LogEntry::new(EventType::PersistenceFailure, Severity::Warning);
            e.key = Some(key.clone());
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => return None,
    };
    Some(entry)
}
