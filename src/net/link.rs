//! Article link classification.
//!
//! The one predicate every prefetch strategy asks before touching a link.

use crate::config::LinkPolicy;

/// Whether `href` points at an article page worth prefetching.
///
/// Eligible links are non-empty, end with the content suffix, are not the
/// index page, and are relative to the current site.
pub fn is_eligible(href: &str, policy: &LinkPolicy) -> bool {
    !href.is_empty()
        && href.ends_with(policy.content_suffix.as_str())
        && !href.contains(policy.index_page.as_str())
        && !href.starts_with(policy.external_prefix.as_str())
}

/// [`is_eligible`] with the stock policy (`.html`, `index.html`, `http`).
pub fn is_article_link(href: &str) -> bool {
    is_eligible(href, &LinkPolicy::default())
}
