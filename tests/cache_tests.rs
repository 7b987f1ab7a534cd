use chrono::Duration;
use pantry_core::cache::CacheStore;
use pantry_core::config::CacheSettings;
use pantry_core::core::clock::ManualClock;
use pantry_core::{fingerprint, Fingerprint, NormalizedQuery, Recipe};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

fn key(i: usize) -> Fingerprint {
    fingerprint(&NormalizedQuery::new([format!("ingredient {}", i)]))
}

fn recipes(id: u64) -> Vec<Recipe> {
    let have: BTreeSet<String> = ["rice".to_string()].into_iter().collect();
    vec![Recipe::matched_against(id, format!("recipe {}", id), ["rice", "beans"], &have)]
}

fn settings(ttl_secs: u64, max_entries: usize, dir: Option<&tempfile::TempDir>) -> CacheSettings {
    CacheSettings {
        ttl_secs,
        max_entries,
        path: dir.map(|d| d.path().join("cache.json")),
    }
}

#[test]
fn entry_queried_after_ttl_is_a_miss_and_is_removed() {
    let clock = Arc::new(ManualClock::default());
    let store = CacheStore::open(&settings(3600, 10, None), clock.clone());
    store.put(key(0), recipes(1));

    clock.advance(Duration::seconds(3600));
    assert!(store.get(&key(0)).is_some(), "age equal to TTL is still fresh");

    clock.advance(Duration::milliseconds(1));
    assert!(store.get(&key(0)).is_none());
    assert_eq!(store.len(), 0);
}

#[test]
fn inserting_n_plus_one_evicts_exactly_the_least_recent() {
    let n = 5;
    let clock = Arc::new(ManualClock::default());
    let store = CacheStore::open(&settings(3600, n, None), clock.clone());

    for i in 0..n {
        store.put(key(i), recipes(i as u64));
        clock.advance(Duration::seconds(1));
    }
    // Touch everything except entry 2, newest last.
    for i in [0, 1, 3, 4] {
        store.get(&key(i));
        clock.advance(Duration::seconds(1));
    }
    let evictions_before = store.stats().evictions;

    store.put(key(n), recipes(99));

    assert_eq!(store.len(), n);
    assert_eq!(store.stats().evictions - evictions_before, 1);
    assert!(store.get(&key(2)).is_none());
    for i in [0, 1, 3, 4, n] {
        assert!(store.get(&key(i)).is_some(), "entry {} should survive", i);
    }
}

#[test]
fn capacity_is_never_exceeded_under_concurrent_puts() {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(CacheStore::open(&settings(3600, 16, None), clock));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    store.put(key(t * 1000 + i), recipes(i as u64));
                    store.get(&key(t * 1000 + i / 2));
                    assert!(store.len() <= 16);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.len(), 16);
}

#[test]
fn entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::default());
    {
        let store = CacheStore::open(&settings(3600, 10, Some(&dir)), clock.clone());
        store.put(key(1), recipes(7));
        store.put(key(2), recipes(8));
    }

    clock.advance(Duration::minutes(5));
    let reopened = CacheStore::open(&settings(3600, 10, Some(&dir)), clock.clone());
    assert_eq!(reopened.len(), 2);
    let entry = reopened.get(&key(1)).unwrap();
    assert_eq!(entry.recipes[0].id, 7);
    assert_eq!(entry.last_accessed_at - entry.created_at, Duration::minutes(5));
}

#[test]
fn reopen_drops_expired_and_trims_to_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::default());
    {
        let store = CacheStore::open(&settings(3600, 10, Some(&dir)), clock.clone());
        store.put(key(1), recipes(1));
        clock.advance(Duration::minutes(50));
        for i in 2..6 {
            store.put(key(i), recipes(i as u64));
            clock.advance(Duration::seconds(1));
        }
    }

    clock.advance(Duration::minutes(15));
    let reopened = CacheStore::open(&settings(3600, 2, Some(&dir)), clock);
    assert_eq!(reopened.len(), 2);
    assert!(reopened.get(&key(1)).is_none());
    assert!(reopened.get(&key(4)).is_some());
    assert!(reopened.get(&key(5)).is_some());
}

#[test]
fn corrupt_file_is_an_empty_cache() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cache.json"), b"{\"entries\": [ {oops").unwrap();

    let clock = Arc::new(ManualClock::default());
    let store = CacheStore::open(&settings(3600, 10, Some(&dir)), clock.clone());
    assert!(store.is_empty());

    // The store still works and overwrites the bad file.
    store.put(key(1), recipes(1));
    let reopened = CacheStore::open(&settings(3600, 10, Some(&dir)), clock);
    assert_eq!(reopened.len(), 1);
}

#[test]
fn unknown_fields_in_file_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::default());
    {
        let store = CacheStore::open(&settings(3600, 10, Some(&dir)), clock.clone());
        store.put(key(1), recipes(1));
    }

    let path = dir.path().join("cache.json");
    let mut raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    raw["written_by"] = serde_json::json!("a newer build");
    raw["entries"][0]["priority"] = serde_json::json!(3);
    raw["entries"][0]["recipes"][0]["metadata"]["calories"] = serde_json::json!(420);
    std::fs::write(&path, serde_json::to_vec(&raw).unwrap()).unwrap();

    let reopened = CacheStore::open(&settings(3600, 10, Some(&dir)), clock);
    assert_eq!(reopened.len(), 1);
}

#[test]
fn stats_and_clear() {
    let clock = Arc::new(ManualClock::default());
    let store = CacheStore::open(&settings(3600, 10, None), clock.clone());
    store.put(key(1), recipes(1));
    store.put(key(2), recipes(2));
    clock.advance(Duration::seconds(30));
    store.get(&key(1));
    store.get(&key(3));

    let stats = store.stats();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.recipes_cached, 2);
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert_eq!(stats.average_age, Duration::seconds(30));

    store.clear();
    assert!(store.is_empty());
}
