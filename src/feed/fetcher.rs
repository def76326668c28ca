use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::parser::{parse_feed, FeedItem};

/// Default bound on a single fetch (request plus body).
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(6000);
/// Default cap on a response body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024; // 5MB

/// Why a fetch did not produce a feed.
///
/// Everything except [`FetchError::NotAFeed`] is a network-level failure:
/// the discovery cascade stops on those, while `NotAFeed` hands the body
/// to the HTML strategies so they never refetch the page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("bad status code {0}")]
    HttpStatus(u16),
    /// Request plus body read exceeded the fetch timeout
    #[error("request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("response too large")]
    TooLarge,
    /// 2xx response whose body is not RSS/Atom/JSON Feed
    #[error("not a feed")]
    NotAFeed {
        /// Raw response body, decoded lossily as UTF-8
        body: String,
    },
}

impl FetchError {
    /// True for connection, status, timeout and size failures.
    pub fn is_network_failure(&self) -> bool {
        !matches!(self, FetchError::NotAFeed { .. })
    }

    /// The page body carried by a parse-level failure.
    pub fn page_body(&self) -> Option<&str> {
        match self {
            FetchError::NotAFeed { body } => Some(body),
            _ => None,
        }
    }
}

/// A successfully fetched and parsed feed.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    /// The URL the feed was fetched from
    pub url: String,
    pub title: String,
    pub items: Vec<FeedItem>,
    /// Unix seconds at fetch time; pollers use it as their "since" marker
    pub fetched_at: i64,
}

/// Timed HTTP GET plus feed parse.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_body_bytes: usize,
}

impl FeedFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_FETCH_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Fetch `url` and parse the body as a feed.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`] when request and body together exceed the timeout
    /// - [`FetchError::Network`] / [`FetchError::HttpStatus`] / [`FetchError::TooLarge`]
    ///   for transport failures
    /// - [`FetchError::NotAFeed`] when a 2xx body does not parse, with the body attached
    pub async fn fetch(&self, url: &str) -> Result<FetchedFeed, FetchError> {
        let bytes = tokio::time::timeout(self.timeout, self.fetch_bytes(url))
            .await
            .map_err(|_| FetchError::Timeout)??;

        match parse_feed(&bytes) {
            Ok(feed) => {
                tracing::debug!(url = %url, items = feed.items.len(), "Fetched feed");
                Ok(FetchedFeed {
                    url: url.to_owned(),
                    title: feed.title,
                    items: feed.items,
                    fetched_at: chrono::Utc::now().timestamp(),
                })
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Body is not a proper feed");
                Err(FetchError::NotAFeed {
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                })
            }
        }
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "Invalid status code");
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        read_limited_bytes(response, self.max_body_bytes).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::TooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::TooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
