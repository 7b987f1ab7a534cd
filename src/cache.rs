// File: src/cache.rs
//! Fingerprint → recipes cache with TTL expiry and LRU capacity eviction.
//!
//! All operations take the same lock, so a `get` never observes a
//! half-written entry and concurrent `put`s never lose updates. With a
//! backing path the store is write-through: every mutation is flushed with
//! an atomic rename. A backing file that cannot be read starts the store
//! empty.

use crate::config::CacheSettings;
use crate::core::clock::Clock;
use crate::core::fingerprint::Fingerprint;
use crate::core::types::Recipe;
use crate::error::PersistenceError;
use crate::persistence::{load_json, save_json};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub recipes: Vec<Recipe>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    #[serde(default)]
    pub access_count: u64,
}

/// On-disk layout. Unknown fields are ignored on read.
#[derive(Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    entries: Vec<CacheEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub recipes_cached: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub average_age: Duration,
}

struct Inner {
    entries: HashMap<Fingerprint, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

pub struct CacheStore {
    inner: Mutex<Inner>,
    ttl: Duration,
    max_entries: usize,
    path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    /// Memory-only store.
    pub fn new(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            ttl,
            max_entries: max_entries.max(1),
            path: None,
            clock,
        }
    }

    /// Store configured from settings, loading the backing file if there is
    /// one. Expired entries are dropped and the rest trimmed to capacity.
    pub fn open(settings: &CacheSettings, clock: Arc<dyn Clock>) -> Self {
        let mut store = Self::new(settings.ttl(), settings.max_entries, clock);
        let Some(path) = settings.path.clone() else {
            return store;
        };

        match load_json::<CacheFile>(&path) {
            Ok(Some(file)) => {
                let mut inner = store.inner.lock();
                for entry in file.entries {
                    inner.entries.insert(entry.fingerprint.clone(), entry);
                }
                drop(inner);
                let expired = store.evict_expired();
                let trimmed = store.evict_over_capacity();
                info!(
                    path = %path.display(),
                    entries = store.len(),
                    expired,
                    trimmed,
                    "recipe cache loaded"
                );
            }
            Ok(None) => debug!(path = %path.display(), "no cache file yet, starting empty"),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cache file unreadable, starting empty");
            }
        }
        store.path = Some(path);
        store
    }

    /// Live entry for `key`. Expired entries are removed and reported as a
    /// miss; hits refresh `last_accessed_at`.
    pub fn get(&self, key: &Fingerprint) -> Option<CacheEntry> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(key) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(entry) => now - entry.created_at > self.ttl,
        };

        if expired {
            inner.entries.remove(key);
            inner.misses += 1;
            inner.evictions += 1;
            debug!(fingerprint = %key, "cache entry expired");
            self.flush_locked(&inner);
            return None;
        }

        inner.hits += 1;
        let entry = inner.entries.get_mut(key)?;
        entry.last_accessed_at = now;
        entry.access_count += 1;
        Some(entry.clone())
    }

    /// Inserts or replaces the entry for `key`, evicting least-recently-used
    /// entries if the store would exceed capacity.
    pub fn put(&self, key: Fingerprint, recipes: Vec<Recipe>) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let entry = CacheEntry {
            fingerprint: key.clone(),
            recipes,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
        };
        inner.entries.insert(key, entry);
        self.evict_over_capacity_locked(&mut inner);
        self.flush_locked(&inner);
    }

    /// Removes every entry older than the TTL. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        let ttl = self.ttl;
        inner.entries.retain(|_, entry| now - entry.created_at <= ttl);
        let removed = before - inner.entries.len();
        if removed > 0 {
            inner.evictions += removed as u64;
            self.flush_locked(&inner);
        }
        removed
    }

    /// Evicts least-recently-used entries until the store is within
    /// capacity. Returns how many were removed.
    pub fn evict_over_capacity(&self) -> usize {
        let mut inner = self.inner.lock();
        let removed = self.evict_over_capacity_locked(&mut inner);
        if removed > 0 {
            self.flush_locked(&inner);
        }
        removed
    }

    fn evict_over_capacity_locked(&self, inner: &mut Inner) -> usize {
        let mut removed = 0;
        while inner.entries.len() > self.max_entries {
            // Oldest access first; fingerprint breaks ties so eviction is deterministic.
            let victim = inner
                .entries
                .values()
                .min_by(|a, b| {
                    a.last_accessed_at
                        .cmp(&b.last_accessed_at)
                        .then_with(|| a.fingerprint.cmp(&b.fingerprint))
                })
                .map(|entry| entry.fingerprint.clone());
            let Some(victim) = victim else { break };
            inner.entries.remove(&victim);
            debug!(fingerprint = %victim, "evicted least recently used cache entry");
            removed += 1;
        }
        inner.evictions += removed as u64;
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        self.flush_locked(&inner);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let inner = self.inner.lock();
        let entries = inner.entries.len();
        let total_age_ms: i64 = inner
            .entries
            .values()
            .map(|entry| (now - entry.created_at).num_milliseconds())
            .sum();
        let average_age = if entries == 0 {
            Duration::zero()
        } else {
            Duration::milliseconds(total_age_ms / entries as i64)
        };
        CacheStats {
            entries,
            recipes_cached: inner.entries.values().map(|e| e.recipes.len()).sum(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            average_age,
        }
    }

    /// Writes the current contents to the backing file, if any.
    pub fn flush(&self) -> Result<(), PersistenceError> {
        let inner = self.inner.lock();
        self.write_file(&inner)
    }

    fn flush_locked(&self, inner: &Inner) {
        if let Err(err) = self.write_file(inner) {
            warn!(error = %err, "failed to persist recipe cache");
        }
    }

    fn write_file(&self, inner: &Inner) -> Result<(), PersistenceError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut entries: Vec<CacheEntry> = inner.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        save_json(
            &CacheFile {
                version: CACHE_FORMAT_VERSION,
                entries,
            },
            path,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::fingerprint::fingerprint;
    use crate::core::types::NormalizedQuery;

    fn key(name: &str) -> Fingerprint {
        fingerprint(&NormalizedQuery::new([name]))
    }

    fn store(ttl_secs: i64, capacity: usize) -> (CacheStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = CacheStore::new(Duration::seconds(ttl_secs), capacity, clock.clone());
        (store, clock)
    }

    #[test]
    fn hit_within_ttl() {
        let (store, clock) = store(60, 10);
        store.put(key("eggs"), Vec::new());
        clock.advance(Duration::seconds(60));
        assert!(store.get(&key("eggs")).is_some());
        assert_eq!(store.stats().hits, 1);
    }

    #[test]
    fn expired_entry_is_a_miss_and_is_removed() {
        let (store, clock) = store(60, 10);
        store.put(key("eggs"), Vec::new());
        clock.advance(Duration::seconds(60) + Duration::milliseconds(1));
        assert!(store.get(&key("eggs")).is_none());
        assert!(store.is_empty());
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn hit_refreshes_last_access() {
        let (store, clock) = store(600, 10);
        store.put(key("rice"), Vec::new());
        clock.advance(Duration::seconds(5));
        let entry = store.get(&key("rice")).unwrap();
        assert_eq!(entry.last_accessed_at - entry.created_at, Duration::seconds(5));
        assert_eq!(entry.access_count, 1);
    }

    #[test]
    fn over_capacity_evicts_least_recently_used() {
        let (store, clock) = store(600, 2);
        store.put(key("a"), Vec::new());
        clock.advance(Duration::seconds(1));
        store.put(key("b"), Vec::new());
        clock.advance(Duration::seconds(1));
        // "a" becomes the most recently used.
        assert!(store.get(&key("a")).is_some());
        clock.advance(Duration::seconds(1));
        store.put(key("c"), Vec::new());

        assert_eq!(store.len(), 2);
        assert!(store.get(&key("b")).is_none());
        assert!(store.get(&key("a")).is_some());
        assert!(store.get(&key("c")).is_some());
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn evict_expired_sweeps_all_stale_entries() {
        let (store, clock) = store(10, 10);
        store.put(key("a"), Vec::new());
        store.put(key("b"), Vec::new());
        clock.advance(Duration::seconds(5));
        store.put(key("c"), Vec::new());
        clock.advance(Duration::seconds(6));
        assert_eq!(store.evict_expired(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn replacing_an_entry_does_not_evict() {
        let (store, _clock) = store(600, 1);
        store.put(key("a"), Vec::new());
        store.put(key("a"), Vec::new());
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().evictions, 0);
    }
}
