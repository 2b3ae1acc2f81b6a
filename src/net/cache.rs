//! Persistent page cache with time-based expiry.
//!
//! The whole cache is one JSON blob stored under a single key in a
//! [`DurableStore`]. Reads fail open to an empty cache; failed writes trigger
//! an eviction pass and are otherwise dropped. There is no background expiry:
//! stale entries linger until [`CacheStore::evict_expired`] runs, and
//! freshness checks simply treat them as missing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::StoreError;

/// One cached page body and the time it was fetched (epoch ms).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content: String,
    pub timestamp: u64,
}

/// URL → entry mapping, serialized as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cache {
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the entry for `url`, if any.
    pub fn get(&self, url: &str) -> Option<CacheEntry> {
        self.entries.get(url).cloned()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn insert(&mut self, url: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(url.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// URLs with their fetch timestamps, sorted by URL.
    pub fn timestamps(&self) -> Vec<(String, u64)> {
        let mut out: Vec<_> = self
            .entries
            .iter()
            .map(|(url, entry)| (url.clone(), entry.timestamp))
            .collect();
        out.sort();
        out
    }

    fn retain(&mut self, keep: impl FnMut(&String, &mut CacheEntry) -> bool) {
        self.entries.retain(keep);
    }
}

/// The in-memory cache shared by the executor and every strategy.
pub type SharedCache = Arc<Mutex<Cache>>;

pub fn shared(cache: Cache) -> SharedCache {
    Arc::new(Mutex::new(cache))
}

/// Lock the shared cache. A panic in another holder does not corrupt a
/// map of owned strings, so poisoning is ignored.
pub fn lock(cache: &SharedCache) -> MutexGuard<'_, Cache> {
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// String-keyed durable storage slot, in the manner of browser local storage.
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

fn check_quota(quota: Option<usize>, value: &str) -> Result<(), StoreError> {
    match quota {
        Some(quota) if value.len() > quota => Err(StoreError::QuotaExceeded {
            needed: value.len(),
            quota,
        }),
        _ => Ok(()),
    }
}

/// One file per key under a directory.
pub struct FileStore {
    dir: PathBuf,
    quota: Option<usize>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, quota: Option<usize>) -> Self {
        Self {
            dir: dir.into(),
            quota,
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        check_quota(self.quota, value)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }
}

/// Process-local store. Counts successful writes.
#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
    writes: std::sync::atomic::AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    /// Number of successful `set` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.slots.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.slots().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        check_quota(self.quota, value)?;
        self.slots().insert(key.to_string(), value.to_string());
        self.writes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

/// Load/save/evict front end over a [`DurableStore`].
pub struct CacheStore {
    store: Arc<dyn DurableStore>,
    key: String,
    duration_ms: u64,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(
        store: Arc<dyn DurableStore>,
        key: impl Into<String>,
        duration_ms: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            duration_ms,
            clock,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Age of an entry fetched at `timestamp`. Future timestamps count as age 0.
    pub fn age_ms(&self, timestamp: u64) -> u64 {
        self.now_ms().saturating_sub(timestamp)
    }

    /// Read the persisted cache. Missing or corrupt data yields an empty cache.
    pub fn load(&self) -> Cache {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Cache::new(),
            Err(e) => {
                log::warn!("Cache read failed, starting empty: {}", e);
                return Cache::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("Cache blob under '{}' is corrupt, starting empty: {}", self.key, e);
            Cache::new()
        })
    }

    /// Persist the whole cache. On failure, evict expired entries and drop
    /// this write.
    pub fn save(&self, cache: &Cache) {
        let blob = match serde_json::to_string(cache) {
            Ok(blob) => blob,
            Err(e) => {
                log::warn!("Cache serialization failed: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(&self.key, &blob) {
            log::warn!("Cache write dropped ({}), evicting expired entries", e);
            self.evict_expired();
        }
    }

    /// Remove every persisted entry whose age reached the threshold.
    /// Writes back only when something was removed. Returns the number removed.
    pub fn evict_expired(&self) -> usize {
        let mut cache = self.load();
        let now = self.now_ms();
        let before = cache.len();

        cache.retain(|_, entry| now.saturating_sub(entry.timestamp) < self.duration_ms);

        let removed = before - cache.len();
        if removed > 0 {
            log::debug!("Evicted {} expired cache entries", removed);
            self.save(&cache);
        }
        removed
    }

    /// True iff `url` is cached and younger than the threshold.
    pub fn is_fresh(&self, url: &str, cache: &Cache) -> bool {
        cache
            .entries
            .get(url)
            .map(|entry| self.age_ms(entry.timestamp) < self.duration_ms)
            .unwrap_or(false)
    }
}
