//! Response cache — content-addressable store for engine responses.
//!
//! Keys are SHAKE-256 over (normalized query | engine name | the subset of
//! generation parameters that affects output), hex-encoded to 64 chars.
//! Identical inputs always map to the same key; one entry per key (upsert).
//!
//! # Invariants
//! - A hit increments `hit_count` and refreshes `last_accessed` as part of
//!   the lookup itself, under the same write lock — concurrent hits never
//!   lose an increment.
//! - An entry past `expires_at` is a miss and is removed by the lookup
//!   that observed it.
//! - A payload that fails to deserialize is deleted in place and treated
//!   as a miss, never surfaced as an error.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

use sha3::{
    digest::{ExtendableOutput, Update, XofReader},
    Shake256,
};
use tracing::{debug, info, warn};

use crate::types::{CacheStats, CachedResponse, GenerationParams};

/// One resident cache entry. The payload stays serialized until read so
/// corruption is detectable (and recoverable) at lookup time.
#[derive(Debug, Clone)]
struct CacheEntry {
    query: String,
    engine_name: String,
    payload: String,
    metadata: serde_json::Value,
    created_at: SystemTime,
    expires_at: SystemTime,
    hit_count: u64,
    last_accessed: SystemTime,
}

/// Filter for [`ResponseCache::invalidate`]. With neither field set, every
/// entry is removed.
#[derive(Debug, Clone, Default)]
pub struct InvalidationFilter {
    /// Remove only entries produced by this engine.
    pub engine_name: Option<String>,
    /// Remove only entries whose stored query contains this substring.
    pub query_contains: Option<String>,
}

impl InvalidationFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn engine(name: &str) -> Self {
        Self {
            engine_name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn query(substring: &str) -> Self {
        Self {
            query_contains: Some(substring.to_string()),
            ..Self::default()
        }
    }
}

/// TTL-bounded response cache with hit counting.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache whose entries live for `ttl_days` days.
    pub fn new(ttl_days: u64) -> Self {
        Self::with_ttl(Duration::from_secs(ttl_days * 24 * 60 * 60))
    }

    /// Create a cache with an explicit TTL (used by expiry tests).
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Deterministic cache key: SHAKE-256 of the normalized query, engine
    /// name, and content-affecting generation parameters.
    pub fn cache_key(query: &str, engine_name: &str, params: &GenerationParams) -> String {
        let material = format!(
            "{}|{}|{}",
            query.trim().to_lowercase(),
            engine_name,
            params.cache_facet()
        );
        shake256_hex(material.as_bytes())
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    /// Look up a cached response.
    ///
    /// On a hit, the entry's `hit_count` is incremented and `last_accessed`
    /// refreshed atomically with the read. Expired and corrupted entries
    /// are removed and reported as a miss.
    pub fn lookup(
        &self,
        query: &str,
        engine_name: &str,
        params: &GenerationParams,
    ) -> Option<CachedResponse> {
        let key = Self::cache_key(query, engine_name, params);
        let now = SystemTime::now();

        // Write lock for the whole operation: the hit-count increment is
        // part of the lookup contract, not an optimization detail.
        let mut entries = self.write_guard();

        let entry = entries.get_mut(&key)?;

        if now >= entry.expires_at {
            debug!(key = %key, "cache entry expired; removing");
            entries.remove(&key);
            return None;
        }

        // Corrupted payload: delete in place, treat as a miss.
        let response: serde_json::Value = match serde_json::from_str(&entry.payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(key = %key, "corrupted cache payload ({}); deleting entry", e);
                entries.remove(&key);
                return None;
            }
        };

        entry.hit_count += 1;
        entry.last_accessed = now;

        Some(CachedResponse {
            response,
            cache_key: key,
            created_at: entry.created_at,
            hit_count: entry.hit_count,
            metadata: entry.metadata.clone(),
        })
    }

    // ── Store ─────────────────────────────────────────────────────────────────

    /// Upsert a response. A repeated store under the same key replaces the
    /// previous entry wholesale — fresh `hit_count`, fresh expiry.
    pub fn store(
        &self,
        query: &str,
        engine_name: &str,
        params: &GenerationParams,
        response: &serde_json::Value,
        metadata: serde_json::Value,
    ) -> String {
        let key = Self::cache_key(query, engine_name, params);
        let now = SystemTime::now();

        let entry = CacheEntry {
            query: query.to_string(),
            engine_name: engine_name.to_string(),
            payload: response.to_string(),
            metadata,
            created_at: now,
            expires_at: now + self.ttl,
            hit_count: 0,
            last_accessed: now,
        };

        self.write_guard().insert(key.clone(), entry);
        debug!(key = %key, engine = %engine_name, "response cached");
        key
    }

    // ── Invalidation ──────────────────────────────────────────────────────────

    /// Remove entries matching `filter`; returns the number removed.
    ///
    /// Must be called whenever the engine profile set changes — a priority
    /// shift can change which engine would have produced a cached answer,
    /// making existing entries semantically suspect.
    pub fn invalidate(&self, filter: &InvalidationFilter) -> usize {
        let matches = |e: &CacheEntry| -> bool {
            match (&filter.engine_name, &filter.query_contains) {
                // No filter at all: every entry matches.
                (None, None) => true,
                (engine, query) => {
                    engine.as_deref().is_some_and(|n| e.engine_name == n)
                        || query.as_deref().is_some_and(|s| e.query.contains(s))
                }
            }
        };

        let mut entries = self.write_guard();
        let before = entries.len();
        entries.retain(|_, e| !matches(e));
        let removed = before - entries.len();
        if removed > 0 {
            info!(removed, "cache entries invalidated");
        }
        removed
    }

    /// Remove every entry past its TTL; returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut entries = self.write_guard();
        let before = entries.len();
        entries.retain(|_, e| now < e.expires_at);
        before - entries.len()
    }

    // ── Stats ─────────────────────────────────────────────────────────────────

    /// Aggregate counters over the resident entries.
    pub fn stats(&self) -> CacheStats {
        let now = SystemTime::now();
        let entries = self.read_guard();

        let total_entries = entries.len();
        let valid_entries = entries.values().filter(|e| now < e.expires_at).count();
        let total_hits = entries.values().map(|e| e.hit_count).sum();
        let size_bytes = entries.values().map(|e| e.payload.len()).sum();

        let mut per_engine: HashMap<&str, usize> = HashMap::new();
        for e in entries.values() {
            *per_engine.entry(e.engine_name.as_str()).or_default() += 1;
        }
        let top_engine = per_engine
            .into_iter()
            .max_by(|(na, ca), (nb, cb)| ca.cmp(cb).then(nb.cmp(na)))
            .map(|(name, _)| name.to_string());

        CacheStats {
            total_entries,
            valid_entries,
            expired_entries: total_entries - valid_entries,
            total_hits,
            size_bytes,
            top_engine,
        }
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Corrupt one entry's payload in place. Test hook for the
    /// corruption-recovery path; compiled into the lib so integration
    /// tests can exercise it.
    #[doc(hidden)]
    pub fn corrupt_entry_for_test(&self, key: &str) -> bool {
        match self.write_guard().get_mut(key) {
            Some(entry) => {
                entry.payload = "{not valid json".to_string();
                true
            }
            None => false,
        }
    }
}

/// Compute SHAKE-256 of `data`, returning a 64-character lower-hex string.
fn shake256_hex(data: &[u8]) -> String {
    let mut hasher = Shake256::default();
    hasher.update(data);
    let mut reader = hasher.finalize_xof();
    let mut output = [0u8; 32];
    reader.read(&mut output);
    hex::encode(output)
}
