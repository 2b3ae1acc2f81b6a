use std::time::Duration;

use url::Url;

use crate::config::PrefetchConfig;
use crate::error::FetchError;

/// Result of fetching a URL
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub body: String,
    pub url: String,
    pub status: u16,
}

/// Anything that can GET a page by href.
///
/// Only successful (2xx) responses come back as `Ok`.
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, href: &str) -> Result<FetchResult, FetchError>;
}

/// Blocking HTTP fetcher that resolves hrefs against the listing page URL.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    base: Option<Url>,
    cache_control: Option<String>,
}

impl HttpFetcher {
    pub fn new(config: &PrefetchConfig, base: Option<Url>) -> Result<Self, FetchError> {
        let client = build_client(&config.user_agent, config.request_timeout())?;
        Ok(Self {
            client,
            base,
            cache_control: config.cache_control.clone(),
        })
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// Resolve an href to the absolute URL that will be requested.
    pub fn resolve(&self, href: &str) -> Result<Url, FetchError> {
        match Url::parse(href) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self
                    .base
                    .as_ref()
                    .ok_or_else(|| FetchError::NoBase(href.to_string()))?;
                base.join(href).map_err(|e| FetchError::InvalidUrl {
                    url: href.to_string(),
                    source: e,
                })
            }
            Err(e) => Err(FetchError::InvalidUrl {
                url: href.to_string(),
                source: e,
            }),
        }
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, href: &str) -> Result<FetchResult, FetchError> {
        let url = self.resolve(href)?;

        let mut request = self.client.get(url.as_str()).header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        );
        if let Some(hint) = &self.cache_control {
            request = request.header("Cache-Control", hint.as_str());
        }

        let response = request.send().map_err(FetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().map_err(FetchError::Body)?;

        Ok(FetchResult {
            body,
            url: final_url,
            status: status.as_u16(),
        })
    }
}

fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::blocking::Client, FetchError> {
    reqwest::blocking::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(FetchError::Client)
}

/// Load the listing page itself: an http(s) URL is fetched, anything else
/// is read as a local file. Returns the body and the base URL links resolve
/// against.
pub fn load_page(location: &str, config: &PrefetchConfig) -> anyhow::Result<(String, Option<Url>)> {
    use anyhow::Context;

    if location.starts_with("http://") || location.starts_with("https://") {
        let fetcher = HttpFetcher::new(config, None)?;
        let result = fetcher
            .fetch(location)
            .with_context(|| format!("Failed to fetch {}", location))?;
        let base = Url::parse(&result.url).ok();
        Ok((result.body, base))
    } else {
        let body = std::fs::read_to_string(location)
            .with_context(|| format!("Failed to read {}", location))?;
        Ok((body, None))
    }
}
