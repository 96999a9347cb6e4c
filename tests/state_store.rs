// tests/state_store.rs
//
// Delivery state on disk: missing file, legacy key, atomic writes, lock file.

use release_watch::delivery::{DeliveryState, StateStore};
use release_watch::error::MonitorError;
use tempfile::TempDir;

#[test]
fn missing_file_is_empty_state() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path().join("nope.json"));
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn persist_then_load_and_no_temp_left_behind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("delivered.json");
    let store = StateStore::new(&path);

    let mut state = DeliveryState::new();
    state.insert("May 2, 2025-B");
    state.insert("May 1, 2025-A");
    store.persist(&state).unwrap();

    assert_eq!(store.load().unwrap(), state);
    assert!(!dir.path().join("nested").join("delivered.json.tmp").exists());

    let raw = std::fs::read_to_string(&path).unwrap();
    let a = raw.find("May 1, 2025-A").unwrap();
    let b = raw.find("May 2, 2025-B").unwrap();
    assert!(a < b, "ids are written sorted");
}

#[test]
fn legacy_state_file_is_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, r#"{"processed_ids": ["Jan 1-Old"]}"#).unwrap();
    let state = StateStore::new(&path).load().unwrap();
    assert!(state.contains("Jan 1-Old"));
}

#[test]
fn unparsable_file_is_an_error_not_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "[1, 2").unwrap();
    let err = StateStore::new(&path).load().unwrap_err();
    assert!(matches!(err, MonitorError::StateCorrupt { .. }));
    assert!(err.to_string().contains("state.json"));
}

#[test]
fn lock_is_exclusive_and_released_on_drop() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));

    let guard = store.lock().unwrap();
    assert!(store.lock_path().exists());
    let err = store.lock().unwrap_err();
    assert!(matches!(err, MonitorError::StateLocked { .. }));

    drop(guard);
    assert!(!store.lock_path().exists());
    let _again = store.lock().unwrap();
}

/// Pid of a child that has already exited and been reaped.
#[cfg(unix)]
fn exited_pid() -> u32 {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

#[cfg(unix)]
#[test]
fn lock_left_by_dead_run_is_taken_over() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    std::fs::write(store.lock_path(), format!("{}\n", exited_pid())).unwrap();

    let guard = store.lock().unwrap();
    let owner = std::fs::read_to_string(store.lock_path()).unwrap();
    assert_eq!(owner.trim(), std::process::id().to_string());

    drop(guard);
    assert!(!store.lock_path().exists());
}

#[test]
fn lock_held_by_live_process_or_unknown_owner_is_refused() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));

    std::fs::write(store.lock_path(), format!("{}\n", std::process::id())).unwrap();
    assert!(matches!(store.lock().unwrap_err(), MonitorError::StateLocked { .. }));

    std::fs::write(store.lock_path(), "").unwrap();
    assert!(matches!(store.lock().unwrap_err(), MonitorError::StateLocked { .. }));
    assert!(store.lock_path().exists());
}
