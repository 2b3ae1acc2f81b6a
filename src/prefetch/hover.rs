//! Prefetch on pointer-enter. Re-armed on every hover.

use std::collections::HashMap;

use crate::dom::links::{LinkId, LinkRef};

use super::{Detached, PrefetchContext};

pub struct HoverPrefetch {
    ctx: PrefetchContext,
    hrefs: HashMap<LinkId, String>,
}

impl HoverPrefetch {
    /// Listen on every link. The bandwidth gate is consulted per hover, not
    /// here.
    pub fn mount(ctx: PrefetchContext, links: &[LinkRef]) -> Self {
        let hrefs = links
            .iter()
            .map(|link| (link.id, link.href.clone()))
            .collect();
        Self { ctx, hrefs }
    }

    pub fn on_pointer_enter(&self, link: LinkId) -> Detached {
        let Some(href) = self.hrefs.get(&link) else {
            log::debug!("Hover on unknown link {}", link);
            return Detached::none();
        };
        if !self.ctx.should_prefetch(href) {
            return Detached::none();
        }
        Detached::single(self.ctx.spawn_prefetch(href.clone()))
    }
}
