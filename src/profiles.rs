//! Engine profile store — per-engine base priority and capability tags.
//!
//! Profiles live in a JSON object keyed by engine name and are owned by
//! this store: the dispatcher reads them on every request, the optimizer
//! is the only writer. Storage is injected through [`ProfileStorage`] so
//! tests can swap the file backend for an in-memory fake.
//!
//! # Invariants
//! - Priority is always clamped to `[1, 100]` on mutation.
//! - Saves are atomic: write to a temp file in the same directory, then
//!   rename over the live file. A crash mid-write cannot corrupt it.
//! - Readers may observe either old or new values while a write is in
//!   flight; priority is a soft ranking, not a correctness-critical value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{PRIORITY_MAX, PRIORITY_MIN};
use crate::error::RouterError;

/// Capability tag for engines suited to multi-step reasoning and analysis.
pub const CAP_REASONING: &str = "reasoning";

/// Capability tag for engines tuned for code tasks.
pub const CAP_CODE: &str = "code";

/// Capability tag for engines that accept image input.
pub const CAP_VISION: &str = "vision";

/// Capability tag for small engines suited to short, low-stakes queries.
pub const CAP_LIGHTWEIGHT: &str = "lightweight";

/// One engine's routing profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineProfile {
    #[serde(skip)]
    pub name: String,
    /// Base scoring weight, 1–100. Mutated only by the optimizer.
    pub priority: i64,
    /// Capability tag set (see the `CAP_*` constants).
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl EngineProfile {
    pub fn new(name: &str, priority: i64, capabilities: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            priority: priority.clamp(PRIORITY_MIN, PRIORITY_MAX),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }
}

/// Profile map as persisted: engine name → profile.
///
/// BTreeMap keeps file output and iteration order stable.
pub type ProfileMap = BTreeMap<String, EngineProfile>;

// ── Storage backend ───────────────────────────────────────────────────────────

/// Injected persistence backend for the profile store.
pub trait ProfileStorage: Send + Sync {
    /// Read the full profile set.
    fn load(&self) -> Result<ProfileMap, RouterError>;

    /// Persist the full profile set. Must be atomic (no half-written state
    /// observable by a concurrent reader or after a crash).
    fn save(&self, profiles: &ProfileMap) -> Result<(), RouterError>;

    /// Take a timestamped backup of the currently persisted set, returning
    /// its location when one was written.
    fn backup(&self) -> Result<Option<PathBuf>, RouterError>;
}

/// JSON-file backend. The on-disk format is an object keyed by engine name:
///
/// ```json
/// { "fast-7b": { "priority": 50, "capabilities": ["lightweight"] } }
/// ```
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileStorage for FileStorage {
    fn load(&self) -> Result<ProfileMap, RouterError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            RouterError::Persistence(format!(
                "cannot read profile file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let mut profiles: ProfileMap = serde_json::from_str(&raw)
            .map_err(|e| RouterError::Serialization(format!("profile file is not valid JSON: {}", e)))?;

        // The map key is authoritative for the name; clamp on the way in so a
        // hand-edited file cannot smuggle an out-of-range priority.
        for (name, profile) in profiles.iter_mut() {
            profile.name = name.clone();
            profile.priority = profile.priority.clamp(PRIORITY_MIN, PRIORITY_MAX);
        }
        Ok(profiles)
    }

    fn save(&self, profiles: &ProfileMap) -> Result<(), RouterError> {
        let json = serde_json::to_string_pretty(profiles)?;

        // Write-temp-then-rename in the same directory; rename is atomic on
        // POSIX filesystems within one mount point.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json.as_bytes()).map_err(|e| {
            RouterError::Persistence(format!("cannot write temp profile file: {}", e))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            RouterError::Persistence(format!("cannot replace profile file: {}", e))
        })?;

        info!(path = %self.path.display(), "engine profiles saved");
        Ok(())
    }

    fn backup(&self) -> Result<Option<PathBuf>, RouterError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let backup_dir = self
            .path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("backups");
        std::fs::create_dir_all(&backup_dir).map_err(|e| {
            RouterError::Persistence(format!("cannot create backup dir: {}", e))
        })?;

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let backup_path = backup_dir.join(format!("engine_profiles_{}.json", stamp));
        std::fs::copy(&self.path, &backup_path).map_err(|e| {
            RouterError::Persistence(format!("cannot write profile backup: {}", e))
        })?;

        info!(path = %backup_path.display(), "profile backup created");
        Ok(Some(backup_path))
    }
}

/// In-memory backend for tests — no disk, no backups.
#[derive(Default)]
pub struct MemoryStorage {
    profiles: RwLock<ProfileMap>,
}

impl MemoryStorage {
    pub fn new(profiles: ProfileMap) -> Self {
        Self {
            profiles: RwLock::new(profiles),
        }
    }
}

impl ProfileStorage for MemoryStorage {
    fn load(&self) -> Result<ProfileMap, RouterError> {
        Ok(self.profiles.read().map_or_else(|e| e.into_inner().clone(), |g| g.clone()))
    }

    fn save(&self, profiles: &ProfileMap) -> Result<(), RouterError> {
        match self.profiles.write() {
            Ok(mut guard) => *guard = profiles.clone(),
            Err(poisoned) => *poisoned.into_inner() = profiles.clone(),
        }
        Ok(())
    }

    fn backup(&self) -> Result<Option<PathBuf>, RouterError> {
        Ok(None)
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Shared profile store: many concurrent dispatcher reads, one optimizer
/// writer at a time.
pub struct EngineProfileStore {
    storage: Box<dyn ProfileStorage>,
    profiles: RwLock<ProfileMap>,
}

impl EngineProfileStore {
    /// Load the profile set from `storage`. A missing or unreadable backing
    /// file degrades to an empty set with a warning — the caller surfaces
    /// the no-engines case as a configuration error at routing time.
    pub fn open(storage: Box<dyn ProfileStorage>) -> Self {
        let profiles = match storage.load() {
            Ok(p) => p,
            Err(e) => {
                warn!("profile load failed ({}); starting with empty profile set", e);
                ProfileMap::new()
            }
        };
        Self {
            storage,
            profiles: RwLock::new(profiles),
        }
    }

    /// Re-read profiles from storage, replacing the in-memory set.
    pub fn reload(&self) -> Result<(), RouterError> {
        let fresh = self.storage.load()?;
        *self.write_guard() = fresh;
        Ok(())
    }

    /// Snapshot of all profiles, sorted by name.
    pub fn snapshot(&self) -> Vec<EngineProfile> {
        self.read_guard().values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<EngineProfile> {
        self.read_guard().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }

    /// Current priority per engine (for dashboards and the demo REPL).
    pub fn current_priorities(&self) -> BTreeMap<String, i64> {
        self.read_guard()
            .iter()
            .map(|(name, p)| (name.clone(), p.priority))
            .collect()
    }

    /// Seed the store (and storage) with `profiles`. Intended for first-run
    /// setup when no profile file exists yet.
    pub fn seed(&self, profiles: ProfileMap) -> Result<(), RouterError> {
        self.storage.save(&profiles)?;
        *self.write_guard() = profiles;
        Ok(())
    }

    /// Apply new priorities under exclusive write access: backup the
    /// persisted set, mutate, clamp, then atomically save.
    ///
    /// Engines named in `changes` that no longer exist are skipped with a
    /// warning (the name set may change between optimizer runs).
    ///
    /// Returns the backup location, when one was taken.
    pub fn apply_priorities(
        &self,
        changes: &[(String, i64)],
    ) -> Result<Option<PathBuf>, RouterError> {
        // Hold the write lock across the read-modify-write-backup sequence
        // so dispatcher reads see either the old set or the new set, never a
        // partially updated one.
        let mut guard = self.write_guard();

        let backup_path = self.storage.backup()?;

        for (name, new_priority) in changes {
            match guard.get_mut(name) {
                Some(profile) => {
                    profile.priority = (*new_priority).clamp(PRIORITY_MIN, PRIORITY_MAX);
                }
                None => warn!(engine = %name, "priority change skipped: engine no longer registered"),
            }
        }

        self.storage.save(&guard)?;
        Ok(backup_path)
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, ProfileMap> {
        self.profiles.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, ProfileMap> {
        self.profiles.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Default profile set used when no profile file exists on first run.
pub fn default_profiles() -> ProfileMap {
    let mut map = ProfileMap::new();
    for profile in [
        EngineProfile::new("fast-7b", 55, &[CAP_LIGHTWEIGHT, CAP_CODE]),
        EngineProfile::new("deep-8x7b", 60, &[CAP_REASONING]),
        EngineProfile::new("vision-2b", 40, &[CAP_VISION, CAP_LIGHTWEIGHT]),
    ] {
        map.insert(profile.name.clone(), profile);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(profiles: ProfileMap) -> EngineProfileStore {
        EngineProfileStore::open(Box::new(MemoryStorage::new(profiles)))
    }

    #[test]
    fn priority_is_clamped_on_construction() {
        assert_eq!(EngineProfile::new("a", 500, &[]).priority, 100);
        assert_eq!(EngineProfile::new("b", -3, &[]).priority, 1);
        assert_eq!(EngineProfile::new("c", 50, &[]).priority, 50);
    }

    #[test]
    fn apply_priorities_clamps_and_persists() {
        let store = store_with(default_profiles());
        store
            .apply_priorities(&[("fast-7b".to_string(), 400), ("deep-8x7b".to_string(), 0)])
            .unwrap();
        assert_eq!(store.get("fast-7b").unwrap().priority, 100);
        assert_eq!(store.get("deep-8x7b").unwrap().priority, 1);
    }

    #[test]
    fn unknown_engine_change_is_skipped() {
        let store = store_with(default_profiles());
        let before = store.current_priorities();
        store
            .apply_priorities(&[("no-such-engine".to_string(), 99)])
            .unwrap();
        assert_eq!(store.current_priorities(), before);
    }

    #[test]
    fn missing_backing_file_degrades_to_empty() {
        let store =
            EngineProfileStore::open(Box::new(FileStorage::new("/nonexistent/profiles.json")));
        assert!(store.is_empty());
    }

    #[test]
    fn capability_lookup() {
        let p = EngineProfile::new("x", 50, &[CAP_REASONING, CAP_CODE]);
        assert!(p.has_capability(CAP_REASONING));
        assert!(!p.has_capability(CAP_VISION));
    }
}
