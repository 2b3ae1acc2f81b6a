//! Prefetch configuration.
//!
//! Loaded from an optional TOML file, then overridden by `BLOG_PREFETCH_*`
//! environment variables. Every field falls back to the built-in default, so
//! an empty file (or no file at all) gives the stock behaviour.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Storage key the serialized cache lives under.
pub const CACHE_KEY: &str = "blog_prefetch_cache";
/// Entries older than this are stale (30 minutes).
pub const CACHE_DURATION_MS: u64 = 30 * 60 * 1000;
/// Prefetches started together by the bulk strategy.
pub const BATCH_SIZE: usize = 3;
/// Delay between consecutive bulk batches.
pub const BATCH_STAGGER_MS: u64 = 100;
/// Longest wait for an idle slot before the bulk scan runs anyway.
pub const IDLE_TIMEOUT_MS: u64 = 2000;
/// Bulk scan delay when the host has no idle scheduling.
pub const FALLBACK_DELAY_MS: u64 = 1000;
/// Upper bound accepted for `batch_stagger_ms`.
pub const MAX_BATCH_STAGGER_MS: u64 = 60_000;

mod defaults {
    pub fn cache_key() -> String {
        super::CACHE_KEY.to_string()
    }

    pub fn content_suffix() -> String {
        ".html".to_string()
    }

    pub fn index_page() -> String {
        "index.html".to_string()
    }

    pub fn external_prefix() -> String {
        "http".to_string()
    }

    pub fn cache_control() -> Option<String> {
        Some("max-age=3600".to_string())
    }

    pub fn user_agent() -> String {
        concat!("blog-prefetch/", env!("CARGO_PKG_VERSION")).to_string()
    }

    pub fn cache_dir() -> std::path::PathBuf {
        std::env::temp_dir().join("blog-prefetch")
    }
}

/// Rules deciding which hrefs are article links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkPolicy {
    /// Suffix every article page ends with
    pub content_suffix: String,
    /// The listing page itself, never prefetched
    pub index_page: String,
    /// Hrefs starting with this are external
    pub external_prefix: String,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            content_suffix: defaults::content_suffix(),
            index_page: defaults::index_page(),
            external_prefix: defaults::external_prefix(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    pub cache_key: String,
    pub cache_duration_ms: u64,
    pub batch_size: usize,
    pub batch_stagger_ms: u64,
    pub idle_timeout_ms: u64,
    pub fallback_delay_ms: u64,
    pub links: LinkPolicy,
    /// Upstream cache hint sent with every prefetch request
    pub cache_control: Option<String>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Directory holding the durable store
    pub cache_dir: PathBuf,
    /// Byte limit for a single stored value; `None` = unlimited
    pub storage_quota_bytes: Option<usize>,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            cache_key: defaults::cache_key(),
            cache_duration_ms: CACHE_DURATION_MS,
            batch_size: BATCH_SIZE,
            batch_stagger_ms: BATCH_STAGGER_MS,
            idle_timeout_ms: IDLE_TIMEOUT_MS,
            fallback_delay_ms: FALLBACK_DELAY_MS,
            links: LinkPolicy::default(),
            cache_control: defaults::cache_control(),
            user_agent: defaults::user_agent(),
            request_timeout_secs: 15,
            cache_dir: defaults::cache_dir(),
            storage_quota_bytes: None,
        }
    }
}

impl PrefetchConfig {
    pub fn batch_stagger(&self) -> Duration {
        Duration::from_millis(self.batch_stagger_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.batch_size > 0, "batch_size must be at least 1");
        anyhow::ensure!(
            self.cache_duration_ms > 0,
            "cache_duration_ms must be greater than zero"
        );
        anyhow::ensure!(
            self.batch_stagger_ms <= MAX_BATCH_STAGGER_MS,
            "batch_stagger_ms must be at most {}",
            MAX_BATCH_STAGGER_MS
        );
        anyhow::ensure!(!self.cache_key.is_empty(), "cache_key must not be empty");
        anyhow::ensure!(
            !self.links.content_suffix.is_empty(),
            "links.content_suffix must not be empty"
        );
        Ok(())
    }

    /// Apply `BLOG_PREFETCH_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        fn parse<T: std::str::FromStr>(key: &str, raw: String) -> Result<T>
        where
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            raw.parse::<T>()
                .with_context(|| format!("invalid value for {}: '{}'", key, raw))
        }

        if let Some(v) = lookup("BLOG_PREFETCH_CACHE_DIR") {
            self.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("BLOG_PREFETCH_CACHE_DURATION_MS") {
            self.cache_duration_ms = parse("BLOG_PREFETCH_CACHE_DURATION_MS", v)?;
        }
        if let Some(v) = lookup("BLOG_PREFETCH_BATCH_SIZE") {
            self.batch_size = parse("BLOG_PREFETCH_BATCH_SIZE", v)?;
        }
        if let Some(v) = lookup("BLOG_PREFETCH_BATCH_STAGGER_MS") {
            self.batch_stagger_ms = parse("BLOG_PREFETCH_BATCH_STAGGER_MS", v)?;
        }
        if let Some(v) = lookup("BLOG_PREFETCH_STORAGE_QUOTA") {
            self.storage_quota_bytes = Some(parse("BLOG_PREFETCH_STORAGE_QUOTA", v)?);
        }
        if let Some(v) = lookup("BLOG_PREFETCH_USER_AGENT") {
            self.user_agent = v;
        }
        Ok(())
    }
}

/// Load configuration from a TOML file, with environment variable overrides.
///
/// A missing path argument yields the defaults (still subject to overrides).
pub fn load_config(path: Option<&Path>) -> Result<PrefetchConfig> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file '{}'", path.display()))?
        }
        None => PrefetchConfig::default(),
    };

    config.apply_env()?;
    config.validate()?;

    log::debug!("Loaded configuration: {:?}", config);
    Ok(config)
}
