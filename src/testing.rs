//! Test doubles shared by the unit tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::FetchError;
use crate::net::fetch::{FetchResult, PageFetcher};

/// Fetcher that answers from memory and records every call.
#[derive(Default)]
pub(crate) struct StubFetcher {
    calls: Mutex<Vec<(String, Instant)>>,
    failing: HashSet<String>,
    latency: Option<Duration>,
}

impl StubFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answer `href` with a 404.
    pub(crate) fn failing(mut self, href: &str) -> Self {
        self.failing.insert(href.to_string());
        self
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub(crate) fn body_for(href: &str) -> String {
        format!("<html><body><h2>{}</h2></body></html>", href)
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.timed_calls().into_iter().map(|(href, _)| href).collect()
    }

    pub(crate) fn timed_calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl PageFetcher for StubFetcher {
    fn fetch(&self, href: &str) -> Result<FetchResult, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((href.to_string(), Instant::now()));

        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        if self.failing.contains(href) {
            return Err(FetchError::Status {
                url: href.to_string(),
                status: 404,
            });
        }

        Ok(FetchResult {
            body: Self::body_for(href),
            url: href.to_string(),
            status: 200,
        })
    }
}
