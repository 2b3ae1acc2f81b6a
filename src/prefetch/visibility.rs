//! One-shot prefetch when a link first scrolls into view.

use std::collections::{HashMap, HashSet};

use crate::dom::links::{LinkId, LinkRef};

use super::{Detached, PrefetchContext};

/// One viewport-intersection report for an observed link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intersection {
    pub link: LinkId,
    pub is_intersecting: bool,
}

impl Intersection {
    pub fn visible(link: LinkId) -> Self {
        Self {
            link,
            is_intersecting: true,
        }
    }

    pub fn hidden(link: LinkId) -> Self {
        Self {
            link,
            is_intersecting: false,
        }
    }
}

/// Observes every link; the first intersection of each is acted on and the
/// link is then dropped from observation for good.
pub struct VisibilityPrefetch {
    ctx: PrefetchContext,
    hrefs: HashMap<LinkId, String>,
    observed: HashSet<LinkId>,
}

impl VisibilityPrefetch {
    /// Start observing `links`. Returns `None` when the host has no viewport
    /// signal or the connection is constrained.
    pub fn mount(ctx: PrefetchContext, links: &[LinkRef], viewport_supported: bool) -> Option<Self> {
        if !viewport_supported {
            log::debug!("Visibility prefetch unavailable: no viewport signal");
            return None;
        }
        if ctx.connection.is_constrained() {
            log::debug!("Visibility prefetch skipped: constrained connection");
            return None;
        }

        let hrefs: HashMap<_, _> = links
            .iter()
            .map(|link| (link.id, link.href.clone()))
            .collect();
        let observed = hrefs.keys().copied().collect();
        Some(Self {
            ctx,
            hrefs,
            observed,
        })
    }

    pub fn is_observing(&self, link: LinkId) -> bool {
        self.observed.contains(&link)
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// Handle a batch of intersection reports.
    pub fn on_intersection(&mut self, entries: &[Intersection]) -> Detached {
        let mut detached = Detached::none();
        for entry in entries {
            if !entry.is_intersecting || !self.observed.remove(&entry.link) {
                continue;
            }
            let Some(href) = self.hrefs.get(&entry.link) else {
                continue;
            };
            if self.ctx.should_prefetch(href) {
                detached.push(self.ctx.spawn_prefetch(href.clone()));
            }
        }
        detached
    }
}
