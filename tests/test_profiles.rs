//! Tests for [`model_router::profiles`]

use model_router::profiles::{
    default_profiles, EngineProfile, EngineProfileStore, FileStorage, MemoryStorage, ProfileMap,
    ProfileStorage, CAP_REASONING,
};

fn profile_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
    dir.path().join("engine_profiles.json")
}

/// Test 1: save-then-load round trips the profile set through the file
/// backend, with names restored from the map keys.
#[test]
fn test_file_storage_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(profile_file(&dir));

    storage.save(&default_profiles()).unwrap();
    let loaded = storage.load().unwrap();

    assert_eq!(loaded.len(), 3);
    let deep = &loaded["deep-8x7b"];
    assert_eq!(deep.name, "deep-8x7b");
    assert_eq!(deep.priority, 60);
    assert!(deep.has_capability(CAP_REASONING));
}

/// Test 2: saving leaves no temp file behind and the live file is valid
/// JSON (atomic replace).
#[test]
fn test_save_is_atomic_replace() {
    let dir = tempfile::tempdir().unwrap();
    let path = profile_file(&dir);
    let storage = FileStorage::new(&path);

    storage.save(&default_profiles()).unwrap();
    storage.save(&default_profiles()).unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&raw).is_ok());
}

/// Test 3: backup copies the live file into backups/ and leaves the
/// original untouched.
#[test]
fn test_backup_copies_live_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = profile_file(&dir);
    let storage = FileStorage::new(&path);
    storage.save(&default_profiles()).unwrap();

    let before = std::fs::read_to_string(&path).unwrap();
    let backup = storage.backup().unwrap().expect("backup path expected");

    assert!(backup.starts_with(dir.path().join("backups")));
    assert_eq!(std::fs::read_to_string(&backup).unwrap(), before);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

/// Test 4: backing up before any file exists is a no-op, not an error.
#[test]
fn test_backup_without_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(profile_file(&dir));
    assert!(storage.backup().unwrap().is_none());
}

/// Test 5: a hand-edited file with an out-of-range priority is clamped
/// on load.
#[test]
fn test_load_clamps_hand_edited_priorities() {
    let dir = tempfile::tempdir().unwrap();
    let path = profile_file(&dir);
    std::fs::write(
        &path,
        r#"{"wild": {"priority": 9000, "capabilities": []}, "low": {"priority": -5}}"#,
    )
    .unwrap();

    let loaded = FileStorage::new(&path).load().unwrap();
    assert_eq!(loaded["wild"].priority, 100);
    assert_eq!(loaded["low"].priority, 1);
    assert!(loaded["low"].capabilities.is_empty(), "capabilities default to empty");
}

/// Test 6: a garbage file is a serialization error, not a panic.
#[test]
fn test_load_rejects_invalid_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = profile_file(&dir);
    std::fs::write(&path, "{definitely not json").unwrap();

    assert!(FileStorage::new(&path).load().is_err());
}

/// Test 7: the store supports concurrent readers while priorities are
/// being applied.
#[test]
fn test_concurrent_reads_during_write() {
    use std::sync::Arc;

    let store = Arc::new(EngineProfileStore::open(Box::new(MemoryStorage::new(
        default_profiles(),
    ))));

    let mut handles = Vec::new();
    for i in 0..4 {
        let store = Arc::clone(&store);
        handles.push(std::thread::spawn(move || {
            for _ in 0..100 {
                // Readers may see old or new values; they must always see
                // a complete, clamped profile set.
                for profile in store.snapshot() {
                    assert!((1..=100).contains(&profile.priority));
                }
                let _ = store.get("fast-7b");
            }
            i
        }));
    }

    for round in 0..50 {
        store
            .apply_priorities(&[("fast-7b".to_string(), 40 + (round % 20))])
            .unwrap();
    }

    for h in handles {
        h.join().unwrap();
    }
}

/// Test 8: seeding persists through the injected storage.
#[test]
fn test_seed_writes_through_storage() {
    let dir = tempfile::tempdir().unwrap();
    let path = profile_file(&dir);
    let store = EngineProfileStore::open(Box::new(FileStorage::new(&path)));
    assert!(store.is_empty());

    let mut profiles = ProfileMap::new();
    let p = EngineProfile::new("solo", 70, &[]);
    profiles.insert(p.name.clone(), p);
    store.seed(profiles).unwrap();

    assert_eq!(store.len(), 1);
    let reloaded = FileStorage::new(&path).load().unwrap();
    assert_eq!(reloaded["solo"].priority, 70);
}
