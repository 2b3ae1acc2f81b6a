//! Speculative article prefetching.
//!
//! Three independent strategies feed one [`Prefetcher`]:
//!
//! ```text
//! page ready / idle ──► BulkPrefetch ────────┐
//! link scrolled in  ──► VisibilityPrefetch ──┼─► eligible? fast link? stale? ─► Prefetcher ─► cache + store
//! pointer enter     ──► HoverPrefetch ───────┘
//! ```
//!
//! Every request runs as a detached background task. Nothing is ever
//! cancelled: dropping a [`Detached`] simply stops tracking the work. The
//! freshness check and the fetch are not atomic, so two strategies hitting
//! the same link at once may both fetch it; the second write just
//! overwrites the first.

pub mod bulk;
pub mod executor;
pub mod hover;
pub mod visibility;

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::clock::Clock;
use crate::config::{LinkPolicy, PrefetchConfig};
use crate::dom::links::{LinkId, LinkSource};
use crate::net::cache::{self, shared, CacheStore, DurableStore, SharedCache};
use crate::net::connection::ConnectionSignal;
use crate::net::fetch::PageFetcher;
use crate::net::link::is_eligible;

pub use bulk::{plan_batches, Batch, BulkPrefetch, Startup};
pub use executor::{PrefetchStats, Prefetcher, StatsSnapshot};
pub use hover::HoverPrefetch;
pub use visibility::{Intersection, VisibilityPrefetch};

/// Background prefetch work that nobody is required to wait for.
#[derive(Debug, Default)]
pub struct Detached {
    handles: Vec<JoinHandle<()>>,
}

impl Detached {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn single(handle: JoinHandle<()>) -> Self {
        Self {
            handles: vec![handle],
        }
    }

    pub fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    pub fn extend(&mut self, other: Detached) {
        self.handles.extend(other.handles);
    }

    /// Number of tasks started.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Block until every task has finished.
    pub fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                log::warn!("Prefetch task panicked");
            }
        }
    }
}

/// Everything a strategy needs to decide on and issue a prefetch.
#[derive(Clone)]
pub struct PrefetchContext {
    pub prefetcher: Arc<Prefetcher>,
    pub cache: SharedCache,
    pub connection: ConnectionSignal,
    pub links: LinkPolicy,
}

impl PrefetchContext {
    pub fn is_eligible(&self, href: &str) -> bool {
        is_eligible(href, &self.links)
    }

    pub fn is_fresh(&self, href: &str) -> bool {
        let cache = cache::lock(&self.cache);
        self.prefetcher.store().is_fresh(href, &cache)
    }

    /// Eligible, not on a constrained link, and not already fresh.
    pub fn should_prefetch(&self, href: &str) -> bool {
        if !self.is_eligible(href) {
            return false;
        }
        if self.connection.is_constrained() {
            log::debug!("Skipping {}: constrained connection", href);
            return false;
        }
        if self.is_fresh(href) {
            log::debug!("Cache HIT: {}", href);
            return false;
        }
        true
    }

    /// Run one prefetch on its own thread.
    pub fn spawn_prefetch(&self, href: String) -> JoinHandle<()> {
        let prefetcher = Arc::clone(&self.prefetcher);
        let cache = Arc::clone(&self.cache);
        std::thread::spawn(move || {
            prefetcher.prefetch(&href, &cache);
        })
    }
}

/// Services the controller runs on.
pub struct PrefetchRuntime {
    pub fetcher: Arc<dyn PageFetcher>,
    pub store: Arc<dyn DurableStore>,
    pub clock: Arc<dyn Clock>,
}

/// Optional facilities the host page offers.
pub struct HostCapabilities {
    pub connection: ConnectionSignal,
    /// Whether viewport-intersection reports will be delivered
    pub viewport: bool,
    pub startup: Startup,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            connection: ConnectionSignal::unavailable(),
            viewport: false,
            startup: Startup::Unavailable,
        }
    }
}

/// All three strategies mounted over one page.
pub struct PrefetchController {
    ctx: PrefetchContext,
    bulk: Option<Detached>,
    visibility: Option<VisibilityPrefetch>,
    hover: HoverPrefetch,
}

impl PrefetchController {
    /// Evict expired entries, load the cache and mount every strategy
    /// against the links `source` reports now.
    pub fn start(
        config: &PrefetchConfig,
        runtime: PrefetchRuntime,
        source: &dyn LinkSource,
        host: HostCapabilities,
    ) -> Self {
        let store = Arc::new(CacheStore::new(
            runtime.store,
            config.cache_key.clone(),
            config.cache_duration_ms,
            runtime.clock,
        ));
        store.evict_expired();
        let cache = shared(store.load());
        log::debug!("Loaded {} cached page(s)", cache::lock(&cache).len());

        let ctx = PrefetchContext {
            prefetcher: Arc::new(Prefetcher::new(runtime.fetcher, store)),
            cache,
            connection: host.connection,
            links: config.links.clone(),
        };

        let links = source.links();
        let bulk = BulkPrefetch::new(ctx.clone(), config).mount(links.clone(), host.startup);
        let visibility = VisibilityPrefetch::mount(ctx.clone(), &links, host.viewport);
        let hover = HoverPrefetch::mount(ctx.clone(), &links);

        log::info!(
            "Prefetch armed over {} link(s): bulk={}, visibility={}, hover=true",
            links.len(),
            bulk.is_some(),
            visibility.is_some()
        );

        Self {
            ctx,
            bulk,
            visibility,
            hover,
        }
    }

    pub fn on_intersection(&mut self, entries: &[Intersection]) -> Detached {
        match &mut self.visibility {
            Some(visibility) => visibility.on_intersection(entries),
            None => Detached::none(),
        }
    }

    pub fn on_pointer_enter(&self, link: LinkId) -> Detached {
        self.hover.on_pointer_enter(link)
    }

    /// Block until the bulk strategy has run every batch.
    pub fn wait_for_bulk(&mut self) {
        if let Some(bulk) = self.bulk.take() {
            bulk.join();
        }
    }

    pub fn bulk_mounted(&self) -> bool {
        self.bulk.is_some()
    }

    pub fn visibility_mounted(&self) -> bool {
        self.visibility.is_some()
    }

    pub fn cache(&self) -> SharedCache {
        Arc::clone(&self.ctx.cache)
    }

    pub fn is_fresh(&self, href: &str) -> bool {
        self.ctx.is_fresh(href)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.prefetcher.stats().snapshot()
    }
}
