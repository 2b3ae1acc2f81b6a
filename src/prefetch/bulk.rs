//! Eager prefetch of every article link once the page has settled.
//!
//! Links are scanned once, filtered to eligible and not fresh, and fetched
//! in fixed-size batches whose start times are staggered so the page does
//! not open a burst of requests at once.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::config::PrefetchConfig;
use crate::dom::links::LinkRef;

use super::{Detached, PrefetchContext};

/// When the bulk scan may start.
pub enum Startup {
    /// Right away (headless hosts, tests).
    Immediate,
    /// When the host signals an idle slot, or after the idle timeout,
    /// whichever comes first. A dropped sender counts as idle.
    Idle(Receiver<()>),
    /// The host has no idle scheduling: wait the fixed fallback delay.
    Unavailable,
}

/// A group of hrefs started together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    /// Start offset from when scheduling began
    pub offset: Duration,
    pub hrefs: Vec<String>,
}

/// Split hrefs into batches of `batch_size`, batch `i` starting at
/// `stagger * i`.
pub fn plan_batches(hrefs: Vec<String>, batch_size: usize, stagger: Duration) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    hrefs
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            offset: stagger_offset(stagger, index),
            hrefs: chunk.to_vec(),
        })
        .collect()
}

/// `stagger * index`, saturating instead of overflowing.
fn stagger_offset(stagger: Duration, index: usize) -> Duration {
    u32::try_from(index)
        .ok()
        .and_then(|i| stagger.checked_mul(i))
        .unwrap_or(Duration::MAX)
}

pub struct BulkPrefetch {
    ctx: PrefetchContext,
    batch_size: usize,
    stagger: Duration,
    idle_timeout: Duration,
    fallback_delay: Duration,
}

impl BulkPrefetch {
    pub fn new(ctx: PrefetchContext, config: &PrefetchConfig) -> Self {
        Self {
            ctx,
            batch_size: config.batch_size,
            stagger: config.batch_stagger(),
            idle_timeout: config.idle_timeout(),
            fallback_delay: config.fallback_delay(),
        }
    }

    /// Eligible links whose href is not fresh in the cache, in page order.
    pub fn scan(&self, links: &[LinkRef]) -> Vec<String> {
        let cache = crate::net::cache::lock(&self.ctx.cache);
        links
            .iter()
            .filter(|link| self.ctx.is_eligible(&link.href))
            .filter(|link| !self.ctx.prefetcher.store().is_fresh(&link.href, &cache))
            .map(|link| link.href.clone())
            .collect()
    }

    /// Arm the strategy. Returns `None` without scheduling anything on a
    /// constrained connection.
    pub fn mount(self, links: Vec<LinkRef>, startup: Startup) -> Option<Detached> {
        if self.ctx.connection.is_constrained() {
            log::debug!("Bulk prefetch skipped: constrained connection");
            return None;
        }

        let handle = std::thread::spawn(move || {
            self.wait_for_start(startup);
            self.run(&links).join();
        });
        Some(Detached::single(handle))
    }

    fn wait_for_start(&self, startup: Startup) {
        match startup {
            Startup::Immediate => {}
            Startup::Idle(idle) => match idle.recv_timeout(self.idle_timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
                Err(RecvTimeoutError::Timeout) => {
                    log::debug!("No idle slot within {:?}, scanning anyway", self.idle_timeout)
                }
            },
            Startup::Unavailable => std::thread::sleep(self.fallback_delay),
        }
    }

    /// Scan and schedule now. Each batch thread sleeps until its offset and
    /// then starts one fetch thread per href. The returned handles finish
    /// when every batch has completed.
    pub fn run(&self, links: &[LinkRef]) -> Detached {
        if self.ctx.connection.is_constrained() {
            log::debug!("Bulk prefetch skipped: constrained connection");
            return Detached::none();
        }

        let hrefs = self.scan(links);
        if hrefs.is_empty() {
            log::debug!("Bulk prefetch: nothing to fetch");
            return Detached::none();
        }

        let batches = plan_batches(hrefs, self.batch_size, self.stagger);
        log::debug!("Bulk prefetch: {} batch(es) scheduled", batches.len());

        let mut detached = Detached::none();
        for batch in batches {
            let ctx = self.ctx.clone();
            detached.push(std::thread::spawn(move || {
                std::thread::sleep(batch.offset);
                if ctx.connection.is_constrained() {
                    log::debug!("Batch {} dropped: constrained connection", batch.index);
                    return;
                }
                let mut fetches = Detached::none();
                for href in batch.hrefs {
                    fetches.push(ctx.spawn_prefetch(href));
                }
                fetches.join();
            }));
        }
        detached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::net::cache::{self, CacheEntry};
    use crate::net::connection::{ConnectionSignal, EffectiveConnectionType};
    use crate::prefetch::tests::context;
    use crate::testing::StubFetcher;
    use std::sync::Arc;
    use std::time::Instant;

    fn hrefs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("post-{}.html", i)).collect()
    }

    fn links(hrefs: &[&str]) -> Vec<LinkRef> {
        hrefs
            .iter()
            .enumerate()
            .map(|(i, h)| LinkRef::new(i, *h))
            .collect()
    }

    #[test]
    fn plan_seven_into_three_batches() {
        let batches = plan_batches(hrefs(7), 3, Duration::from_millis(100));
        let sizes: Vec<_> = batches.iter().map(|b| b.hrefs.len()).collect();
        let offsets: Vec<_> = batches.iter().map(|b| b.offset.as_millis()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(offsets, vec![0, 100, 200]);
        assert_eq!(batches[2].hrefs, vec!["post-6.html".to_string()]);
    }

    #[test]
    fn plan_keeps_every_href_in_order() {
        for n in [0, 1, 3, 4, 10] {
            let batches = plan_batches(hrefs(n), 3, Duration::from_millis(100));
            let flat: Vec<_> = batches.iter().flat_map(|b| b.hrefs.clone()).collect();
            assert_eq!(flat, hrefs(n));
            assert!(batches.iter().all(|b| !b.hrefs.is_empty() && b.hrefs.len() <= 3));
        }
    }

    #[test]
    fn huge_stagger_saturates() {
        let batches = plan_batches(hrefs(4), 1, Duration::from_millis(u64::MAX));
        assert_eq!(batches[0].offset, Duration::ZERO);
        assert_eq!(batches[3].offset, Duration::MAX);
    }

    #[test]
    fn scan_filters_ineligible_and_fresh() {
        let clock = ManualClock::new(10_000);
        let fetcher = Arc::new(StubFetcher::new());
        let ctx = context(fetcher, &clock, ConnectionSignal::unavailable());
        cache::lock(&ctx.cache).insert(
            "fresh.html",
            CacheEntry {
                content: "c".into(),
                timestamp: 10_000,
            },
        );
        cache::lock(&ctx.cache).insert(
            "stale.html",
            CacheEntry {
                content: "c".into(),
                timestamp: 0,
            },
        );
        clock.advance(ctx.prefetcher.store().duration_ms() - 1);

        let bulk = BulkPrefetch::new(ctx, &PrefetchConfig::default());
        let found = bulk.scan(&links(&[
            "index.html",
            "fresh.html",
            "stale.html",
            "https://x.com/post.html",
            "new.html",
            "style.css",
        ]));
        assert_eq!(found, vec!["stale.html".to_string(), "new.html".to_string()]);
    }

    #[test]
    fn run_staggers_batches() {
        let clock = ManualClock::new(0);
        let fetcher = Arc::new(StubFetcher::new());
        let ctx = context(fetcher.clone(), &clock, ConnectionSignal::unavailable());
        let bulk = BulkPrefetch::new(ctx.clone(), &PrefetchConfig::default());

        let all = hrefs(5);
        let refs: Vec<&str> = all.iter().map(String::as_str).collect();
        let started = Instant::now();
        bulk.run(&links(&refs)).join();

        let calls = fetcher.timed_calls();
        assert_eq!(calls.len(), 5);
        for (href, at) in calls {
            let index: usize = href
                .trim_start_matches("post-")
                .trim_end_matches(".html")
                .parse()
                .unwrap();
            let batch = index / 3;
            assert!(at.duration_since(started) >= Duration::from_millis(100 * batch as u64));
        }
        assert_eq!(cache::lock(&ctx.cache).len(), 5);
    }

    #[test]
    fn mount_is_refused_on_constrained_connection() {
        let clock = ManualClock::new(0);
        let fetcher = Arc::new(StubFetcher::new());
        let ctx = context(
            fetcher.clone(),
            &clock,
            ConnectionSignal::reporting(EffectiveConnectionType::TwoG),
        );
        let bulk = BulkPrefetch::new(ctx, &PrefetchConfig::default());
        assert!(bulk.mount(links(&["a.html"]), Startup::Immediate).is_none());
        assert_eq!(fetcher.call_count(), 0);
    }

    #[test]
    fn idle_signal_starts_the_scan() {
        let clock = ManualClock::new(0);
        let fetcher = Arc::new(StubFetcher::new());
        let ctx = context(fetcher.clone(), &clock, ConnectionSignal::unavailable());
        let config = PrefetchConfig {
            idle_timeout_ms: 60_000,
            ..Default::default()
        };
        let bulk = BulkPrefetch::new(ctx, &config);

        let (idle_tx, idle_rx) = std::sync::mpsc::channel();
        let started = Instant::now();
        let detached = bulk
            .mount(links(&["a.html", "b.html"]), Startup::Idle(idle_rx))
            .unwrap();
        idle_tx.send(()).unwrap();
        detached.join();

        assert_eq!(fetcher.call_count(), 2);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn fallback_delay_when_no_idle_scheduling() {
        let clock = ManualClock::new(0);
        let fetcher = Arc::new(StubFetcher::new());
        let ctx = context(fetcher.clone(), &clock, ConnectionSignal::unavailable());
        let config = PrefetchConfig {
            fallback_delay_ms: 50,
            ..Default::default()
        };
        let bulk = BulkPrefetch::new(ctx, &config);

        let started = Instant::now();
        bulk.mount(links(&["a.html"]), Startup::Unavailable)
            .unwrap()
            .join();

        let at = fetcher.timed_calls()[0].1;
        assert!(at.duration_since(started) >= Duration::from_millis(50));
    }

    #[test]
    fn batches_overlap_slow_fetches() {
        let clock = ManualClock::new(0);
        let latency = Duration::from_millis(300);
        let fetcher = Arc::new(StubFetcher::new().with_latency(latency));
        let ctx = context(fetcher.clone(), &clock, ConnectionSignal::unavailable());
        let bulk = BulkPrefetch::new(ctx.clone(), &PrefetchConfig::default());

        let all = hrefs(6);
        let refs: Vec<&str> = all.iter().map(String::as_str).collect();
        let started = Instant::now();
        bulk.run(&links(&refs)).join();
        let total = started.elapsed();

        let calls = fetcher.timed_calls();
        assert_eq!(calls.len(), 6);
        // Every fetch of both batches starts before the first one returns.
        for (href, at) in &calls {
            assert!(
                at.duration_since(started) < latency,
                "{} started after {:?}",
                href,
                at.duration_since(started)
            );
        }
        // Two overlapping batches: about stagger + latency, far below 6 * latency.
        assert!(total < Duration::from_millis(900), "took {:?}", total);
        assert_eq!(cache::lock(&ctx.cache).len(), 6);
    }

    #[test]
    fn idle_timeout_starts_the_scan() {
        let clock = ManualClock::new(0);
        let fetcher = Arc::new(StubFetcher::new());
        let ctx = context(fetcher.clone(), &clock, ConnectionSignal::unavailable());
        let config = PrefetchConfig {
            idle_timeout_ms: 80,
            ..Default::default()
        };
        let bulk = BulkPrefetch::new(ctx, &config);

        // Sender stays alive and never signals.
        let (_idle_tx, idle_rx) = std::sync::mpsc::channel::<()>();
        let started = Instant::now();
        bulk.mount(links(&["a.html"]), Startup::Idle(idle_rx))
            .unwrap()
            .join();

        let at = fetcher.timed_calls()[0].1.duration_since(started);
        assert!(at >= Duration::from_millis(80), "scan began at {:?}", at);
        assert!(at < Duration::from_secs(2), "scan began at {:?}", at);
    }
}
