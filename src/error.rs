use thiserror::Error;

/// Error during a page fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Relative link '{0}' has no base URL to resolve against")]
    NoBase(String),

    #[error("Client error: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to read body: {0}")]
    Body(#[source] reqwest::Error),
}

/// Error from the durable key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage quota exceeded: {needed} bytes requested, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },
}
