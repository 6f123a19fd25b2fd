//! Library flows across manager instances sharing one durable store.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use telemetry_disk_manager::prelude::*;

const TEN_MIB: u64 = 10 * 1024 * 1024;

/// Configuration that counts how often it is consulted.
struct CountingConfig {
    settings: SharedBufferingConfig,
    calls: AtomicUsize,
}

impl CountingConfig {
    fn new(max_cache_size: u64) -> Self {
        Self {
            settings: SharedBufferingConfig::new(BufferingSettings {
                max_cache_size,
                ..BufferingSettings::default()
            }),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BufferingConfig for CountingConfig {
    fn max_cache_size(&self) -> u64 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.settings.max_cache_size()
    }

    fn max_cache_file_size(&self) -> u64 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.settings.max_cache_file_size()
    }
}

fn manager(
    root: &Path,
    store: &Arc<JsonFileStore>,
    config: &Arc<CountingConfig>,
) -> DiskSpaceManager {
    DiskSpaceManager::new(
        Arc::new(FixedCacheRoot::new(root)),
        store.clone(),
        config.clone(),
        None,
    )
}

#[test]
fn ten_mib_budget_survives_a_restart_without_touching_config() {
    let dir = tempfile::tempdir().unwrap();
    let prefs = dir.path().join("state").join("preferences.json");
    let store = Arc::new(JsonFileStore::new(&prefs));
    let config = Arc::new(CountingConfig::new(TEN_MIB));

    let first = manager(dir.path(), &store, &config);
    assert_eq!(first.max_folder_size().unwrap(), 3_495_253);
    drop(first);

    let after_first = config.calls();
    let reopened = Arc::new(JsonFileStore::new(&prefs));
    let second = manager(dir.path(), &reopened, &config);
    assert_eq!(second.max_folder_size().unwrap(), 3_495_253);
    assert_eq!(config.calls(), after_first);
}

#[test]
fn configuration_changes_do_not_move_a_persisted_budget() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("prefs.json")));
    let config = Arc::new(CountingConfig::new(TEN_MIB));
    let manager = manager(dir.path(), &store, &config);

    assert_eq!(manager.max_folder_size().unwrap(), 3_495_253);
    config.settings.update(BufferingSettings {
        max_cache_size: 3 * TEN_MIB,
        max_cache_file_size: 2048,
        ..BufferingSettings::default()
    });

    assert_eq!(manager.max_folder_size().unwrap(), 3_495_253);
    assert_eq!(manager.max_cache_file_size(), 2048);
}

#[test]
fn externally_deleted_store_file_triggers_recomputation() {
    let dir = tempfile::tempdir().unwrap();
    let prefs = dir.path().join("prefs.json");
    let store = Arc::new(JsonFileStore::new(&prefs));
    let config = Arc::new(CountingConfig::new(TEN_MIB));
    let manager = manager(dir.path(), &store, &config);

    manager.max_folder_size().unwrap();
    fs::remove_file(&prefs).unwrap();
    config.settings.update(BufferingSettings {
        max_cache_size: 99,
        ..BufferingSettings::default()
    });

    assert_eq!(manager.max_folder_size().unwrap(), 33);
    assert_eq!(store.get_int(MAX_FOLDER_SIZE_KEY, -1).unwrap(), 33);
}

#[test]
fn temp_is_purged_once_per_instance_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("prefs.json")));
    let config = Arc::new(CountingConfig::new(TEN_MIB));

    let first = manager(dir.path(), &store, &config);
    let temp = first.temporary_dir().unwrap();
    fs::write(temp.join("upload.part"), b"partial").unwrap();
    assert!(first.temporary_dir().unwrap().join("upload.part").exists());

    let signals = first.signals_buffer_dir().unwrap();
    fs::create_dir_all(signals.join(SignalType::Spans.dir_name())).unwrap();
    fs::write(signals.join("spans").join("batch-0001"), b"spans").unwrap();
    drop(first);

    let second = manager(dir.path(), &store, &config);
    let temp_again = second.temporary_dir().unwrap();
    assert_eq!(temp, temp_again);
    assert_eq!(fs::read_dir(&temp_again).unwrap().count(), 0);
    assert!(
        second
            .signal_dir(SignalType::Spans)
            .join("batch-0001")
            .exists()
    );
}

#[test]
fn activity_log_captures_a_manager_lifetime() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("activity.jsonl");

    let mut config = Config::default();
    config.paths.cache_root = Some(dir.path().join("cache"));
    config.paths.preferences_file = dir.path().join("prefs.json");
    config.paths.activity_log = log_path.clone();
    config.buffering.max_cache_size = 300;

    let (handle, join) = spawn_logger(
        telemetry_disk_manager::logger::activity::ActivityLoggerConfig::from_config(&config),
    )
    .unwrap();
    let manager = DiskSpaceManager::from_config(
        &config,
        SharedBufferingConfig::new(config.buffering),
        Some(handle.clone()),
    );
    manager.signals_buffer_dir().unwrap();
    manager.temporary_dir().unwrap();
    assert_eq!(manager.max_folder_size().unwrap(), 100);
    manager.reset_folder_size().unwrap();
    handle.shutdown();
    join.join().unwrap();

    let events: Vec<String> = fs::read_to_string(&log_path)
        .unwrap()
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["event"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        events,
        [
            "manager_start",
            "directory_create",
            "temp_purge",
            "budget_compute",
            "budget_reset"
        ]
    );
}

#[test]
fn remote_refresh_reaches_a_configured_manager() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.paths.cache_root = Some(dir.path().join("cache"));
    config.paths.preferences_file = dir.path().join("prefs.json");
    config.buffering.max_cache_size = TEN_MIB;

    let remote = SharedBufferingConfig::new(config.buffering);
    let manager = DiskSpaceManager::from_config(&config, remote.clone(), None);
    assert_eq!(manager.max_cache_file_size(), 1024 * 1024);

    remote.update(BufferingSettings {
        max_cache_size: 3 * TEN_MIB,
        max_cache_file_size: 512 * 1024,
        ..remote.snapshot()
    });
    assert_eq!(manager.max_cache_file_size(), 512 * 1024);
    assert_eq!(manager.max_folder_size().unwrap(), TEN_MIB);
}

#[test]
fn blocked_cache_root_disables_buffering() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("cache");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("opentelemetry"), b"not a directory").unwrap();

    let manager = DiskSpaceManager::new(
        Arc::new(FixedCacheRoot::new(&root)),
        Arc::new(MemoryStore::new()),
        Arc::new(BufferingSettings::default()),
        None,
    );
    let signals = manager.signals_buffer_dir().unwrap_err();
    let temp = manager.temporary_dir().unwrap_err();
    assert!(signals.disables_buffering());
    assert!(temp.disables_buffering());

    // Budget resolution does not depend on the directories.
    assert_eq!(
        manager.max_folder_size().unwrap(),
        folder_budget(BufferingSettings::default().max_cache_size)
    );
}
