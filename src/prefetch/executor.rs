//! The single place a prefetch actually happens.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::net::cache::{self, CacheEntry, CacheStore, SharedCache};
use crate::net::fetch::PageFetcher;

/// Prefetch counters, shared across threads.
#[derive(Debug, Clone, Default)]
pub struct PrefetchStats {
    /// Requests started
    pub issued: Arc<AtomicUsize>,
    /// Fetches whose response was stored in the cache
    pub succeeded: Arc<AtomicUsize>,
    /// Requests abandoned (transport error or non-2xx)
    pub failed: Arc<AtomicUsize>,
}

/// Point-in-time copy of [`PrefetchStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub issued: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl PrefetchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            issued: self.issued.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Fetches a page and records the body in the shared cache.
pub struct Prefetcher {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<CacheStore>,
    stats: PrefetchStats,
}

impl Prefetcher {
    pub fn new(fetcher: Arc<dyn PageFetcher>, store: Arc<CacheStore>) -> Self {
        Self {
            fetcher,
            store,
            stats: PrefetchStats::new(),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn stats(&self) -> &PrefetchStats {
        &self.stats
    }

    /// GET `href`; on success write `{body, now}` into `cache` and persist.
    ///
    /// Failures are logged and dropped. The caller is expected to have
    /// checked freshness; nothing here prevents a duplicate request racing
    /// with another one for the same href. Returns whether the cache was
    /// updated.
    pub fn prefetch(&self, href: &str, cache: &SharedCache) -> bool {
        self.stats.issued.fetch_add(1, Ordering::Relaxed);
        log::debug!("Prefetching {}", href);

        let result = match self.fetcher.fetch(href) {
            Ok(result) => result,
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                log::info!("Prefetch failed: {}: {}", href, e);
                return false;
            }
        };

        let entry = CacheEntry {
            content: result.body,
            timestamp: self.store.now_ms(),
        };

        {
            let mut guard = cache::lock(cache);
            guard.insert(href, entry);
            self.store.save(&guard);
        }

        self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
        log::info!("Prefetched {} (HTTP {})", href, result.status);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::net::cache::{shared, Cache, MemoryStore};
    use crate::testing::StubFetcher;

    fn prefetcher(fetcher: Arc<StubFetcher>, clock: &ManualClock) -> Prefetcher {
        let store = CacheStore::new(
            Arc::new(MemoryStore::new()),
            "k",
            1_000,
            Arc::new(clock.clone()),
        );
        Prefetcher::new(fetcher, Arc::new(store))
    }

    #[test]
    fn success_is_cached_and_persisted() {
        let clock = ManualClock::new(42_000);
        let fetcher = Arc::new(StubFetcher::new());
        let p = prefetcher(fetcher.clone(), &clock);
        let cache = shared(Cache::new());

        assert!(p.prefetch("nap.html", &cache));

        let entry = cache::lock(&cache).get("nap.html").unwrap();
        assert_eq!(entry.content, StubFetcher::body_for("nap.html"));
        assert_eq!(entry.timestamp, 42_000);
        assert_eq!(p.store().load().get("nap.html"), Some(entry));
        assert_eq!(fetcher.calls(), vec!["nap.html".to_string()]);
        assert_eq!(
            p.stats().snapshot(),
            StatsSnapshot {
                issued: 1,
                succeeded: 1,
                failed: 0
            }
        );
    }

    #[test]
    fn failure_leaves_cache_untouched() {
        let clock = ManualClock::new(0);
        let fetcher = Arc::new(StubFetcher::new().failing("gone.html"));
        let p = prefetcher(fetcher, &clock);
        let cache = shared(Cache::new());

        assert!(!p.prefetch("gone.html", &cache));
        assert!(cache::lock(&cache).is_empty());
        assert!(p.store().load().is_empty());
        assert_eq!(p.stats().snapshot().failed, 1);
    }

    #[test]
    fn refetch_overwrites_timestamp() {
        let clock = ManualClock::new(1_000);
        let fetcher = Arc::new(StubFetcher::new());
        let p = prefetcher(fetcher, &clock);
        let cache = shared(Cache::new());

        p.prefetch("a.html", &cache);
        clock.advance(5_000);
        p.prefetch("a.html", &cache);
        assert_eq!(cache::lock(&cache).get("a.html").unwrap().timestamp, 6_000);
        assert_eq!(cache::lock(&cache).len(), 1);
    }
}
