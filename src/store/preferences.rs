//! File-backed preferences store with atomic persistence.
//!
//! The file is a flat JSON object of integer values:
//!
//! ```text
//! { "max_signal_folder_size": 3495253 }
//! ```
//!
//! Every read goes to disk, so the file stays the single source of truth and an
//! external edit or delete is seen on the next call. Writes are
//! read-modify-write under a process-local lock, then serialize → temp file →
//! fsync → rename so readers never see a partial write.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::core::errors::{Result, TdmError};
use crate::store::KeyValueStore;

type Entries = BTreeMap<String, i64>;

/// Durable [`KeyValueStore`] backed by a JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Store at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self, key: &str) -> Result<Entries> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => {
                return Err(TdmError::persistence(
                    key,
                    format!("read {}: {e}", self.path.display()),
                ));
            }
        };
        if content.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            TdmError::persistence(key, format!("corrupt {}: {e}", self.path.display()))
        })
    }

    fn save(&self, key: &str, entries: &Entries) -> Result<()> {
        write_atomic(&self.path, entries).map_err(|e| {
            TdmError::persistence(key, format!("write {}: {e}", self.path.display()))
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_int(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self.load(key)?.get(key).copied().unwrap_or(default))
    }

    fn set_int(&self, key: &str, value: i64) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut entries = self.load(key)?;
        entries.insert(key.to_string(), value);
        self.save(key, &entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut entries = self.load(key)?;
        if entries.remove(key).is_some() {
            self.save(key, &entries)?;
        }
        Ok(())
    }
}

fn write_atomic(path: &Path, entries: &Entries) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    // Same directory as the target so the rename stays on one filesystem.
    let tmp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}
