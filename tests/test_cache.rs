//! Tests for [`model_router::cache`]

use std::time::Duration;

use model_router::cache::{InvalidationFilter, ResponseCache};
use model_router::types::GenerationParams;
use serde_json::json;

/// Test 1: identical inputs always map to the same key; the key changes
/// when any component changes.
#[test]
fn test_key_determinism() {
    let p = GenerationParams::default();
    assert_eq!(
        ResponseCache::cache_key("Sort this list", "fast", &p),
        ResponseCache::cache_key("  sort this list  ", "fast", &p),
    );
    assert_ne!(
        ResponseCache::cache_key("sort this list", "fast", &p),
        ResponseCache::cache_key("sort this list", "deep", &p),
    );
}

/// Test 2: store-then-lookup round trip returns the stored payload.
#[test]
fn test_store_lookup_roundtrip() {
    let cache = ResponseCache::new(7);
    let p = GenerationParams::default();

    cache.store("q", "fast", &p, &json!({"text": "the answer"}), json!({"ms": 120}));
    let hit = cache.lookup("q", "fast", &p).expect("expected a hit");
    assert_eq!(hit.response["text"], "the answer");
    assert_eq!(hit.metadata["ms"], 120);
    assert_eq!(hit.cache_key.len(), 64);
}

/// Test 3: spec scenario — two stores then a lookup yield the most recent
/// payload with a fresh hit count.
#[test]
fn test_second_store_wins() {
    let cache = ResponseCache::new(7);
    let p = GenerationParams::default();

    cache.store("q", "m", &p, &json!({"text": "r1"}), json!({}));
    cache.store("q", "m", &p, &json!({"text": "r2"}), json!({}));

    let hit = cache.lookup("q", "m", &p).expect("expected a hit");
    assert_eq!(hit.response["text"], "r2");
    assert_eq!(hit.hit_count, 1, "entry was replaced, not merged");
}

/// Test 4: repeated lookups increase hit_count by exactly one per call.
#[test]
fn test_hit_count_monotonic() {
    let cache = ResponseCache::new(7);
    let p = GenerationParams::default();
    cache.store("q", "fast", &p, &json!({"text": "r"}), json!({}));

    let counts: Vec<u64> = (0..4)
        .map(|_| cache.lookup("q", "fast", &p).unwrap().hit_count)
        .collect();
    assert_eq!(counts, vec![1, 2, 3, 4]);
}

/// Test 5: lookup past expiry is a miss and removes the entry; stats see
/// the expired entry while it is still resident.
#[test]
fn test_expiry_lifecycle() {
    let cache = ResponseCache::with_ttl(Duration::from_millis(1));
    let p = GenerationParams::default();
    cache.store("q", "fast", &p, &json!({"text": "r"}), json!({}));
    std::thread::sleep(Duration::from_millis(5));

    let stats = cache.stats();
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.valid_entries, 0);
    assert_eq!(stats.expired_entries, 1);

    assert!(cache.lookup("q", "fast", &p).is_none());
    assert_eq!(cache.stats().total_entries, 0);
}

/// Test 6: corrupted payloads are deleted and reported as a miss, never
/// as an error.
#[test]
fn test_corruption_recovery() {
    let cache = ResponseCache::new(7);
    let p = GenerationParams::default();
    let key = cache.store("q", "fast", &p, &json!({"text": "r"}), json!({}));

    assert!(cache.corrupt_entry_for_test(&key));
    assert!(cache.lookup("q", "fast", &p).is_none());
    assert!(cache.lookup("q", "fast", &p).is_none(), "stays a miss");
    assert_eq!(cache.stats().total_entries, 0);
}

/// Test 7: invalidation by engine, by query substring, and unconditional.
#[test]
fn test_invalidation_modes() {
    let p = GenerationParams::default();

    let cache = ResponseCache::new(7);
    cache.store("merge two lists", "fast", &p, &json!({}), json!({}));
    cache.store("merge two trees", "deep", &p, &json!({}), json!({}));
    cache.store("greet the user", "deep", &p, &json!({}), json!({}));

    assert_eq!(cache.invalidate(&InvalidationFilter::engine("deep")), 2);
    assert_eq!(cache.stats().total_entries, 1);

    let cache = ResponseCache::new(7);
    cache.store("merge two lists", "fast", &p, &json!({}), json!({}));
    cache.store("greet the user", "fast", &p, &json!({}), json!({}));
    assert_eq!(cache.invalidate(&InvalidationFilter::query("merge")), 1);

    let cache = ResponseCache::new(7);
    cache.store("a", "fast", &p, &json!({}), json!({}));
    cache.store("b", "deep", &p, &json!({}), json!({}));
    assert_eq!(cache.invalidate(&InvalidationFilter::all()), 2);
    assert_eq!(cache.stats().total_entries, 0);
}

/// Test 8: concurrent lookups never lose a hit-count increment.
#[test]
fn test_concurrent_hits_are_not_lost() {
    use std::sync::Arc;

    let cache = Arc::new(ResponseCache::new(7));
    let p = GenerationParams::default();
    cache.store("q", "fast", &p, &json!({"text": "r"}), json!({}));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let p = p.clone();
        handles.push(std::thread::spawn(move || {
            for _ in 0..50 {
                cache.lookup("q", "fast", &p).unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(cache.stats().total_hits, 8 * 50);
}
