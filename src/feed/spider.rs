use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::oneshot;
use url::Url;

use crate::feed::model::Rss2;
use crate::feed::parser::{parse_feed, FeedError};

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("PULL RSS Reader ", env!("CARGO_PKG_VERSION"));

const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "en";

/// Default connection-phase timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default cap on the response body.
pub const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur during a spider run.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    /// Network-level error (DNS, connection, TLS, body read, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// The body was fetched but is not a usable feed
    #[error("Parse error: {0}")]
    Feed(#[from] FeedError),
}

/// Outcome of one spider run. Never mutated after it is delivered.
#[derive(Debug, Default)]
pub struct FetchResult {
    /// `None` on success
    pub error: Option<FetchError>,
    /// HTTP status, `None` when the transport failed before a response
    pub status: Option<u16>,
    /// Canonical feed, present only when parsing succeeded
    pub feed: Option<Rss2>,
    /// Lowercase hex SHA-256 of the raw response body
    pub checksum: Option<String>,
    /// Time from request start until the body was parsed
    pub duration: Duration,
}

impl FetchResult {
    fn transport_failure(error: FetchError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Fetches and parses a single feed URL.
///
/// Each run builds its own HTTP client, so concurrent spiders share no
/// state. Certificates are not verified and compression is not negotiated.
///
/// # Timeout
///
/// `timeout` bounds only the connection phase (TCP connect and TLS
/// handshake). A server that accepts the connection and then stalls keeps
/// the run waiting; wrap [`Spider::fetch`] in `tokio::time::timeout` when a
/// whole-request deadline is needed.
#[derive(Debug, Clone)]
pub struct Spider {
    url: Url,
    timeout: Duration,
    max_body_bytes: usize,
}

impl Spider {
    pub fn new(url: Url, timeout_secs: u64) -> Self {
        Self {
            url,
            timeout: Duration::from_secs(timeout_secs),
            max_body_bytes: MAX_FEED_SIZE,
        }
    }

    /// Overrides the response body limit.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Spawns the fetch on the current tokio runtime.
    ///
    /// The receiver yields exactly one [`FetchResult`]. Dropping it does not
    /// cancel the request.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn run(self) -> oneshot::Receiver<FetchResult> {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = self.fetch().await;
            if tx.send(result).is_err() {
                tracing::debug!(url = %self.url, "Spider result dropped (receiver gone)");
            }
        });
        rx
    }

    /// Performs the request, body read and parse in one go.
    pub async fn fetch(&self) -> FetchResult {
        let client = match build_client(self.timeout) {
            Ok(client) => client,
            Err(e) => return FetchResult::transport_failure(FetchError::Client(e)),
        };

        tracing::debug!(url = %self.url, "Fetching feed");
        let start = Instant::now();

        let response = match client.get(self.url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "Feed request failed");
                return FetchResult::transport_failure(FetchError::Network(e));
            }
        };
        let status = response.status().as_u16();

        let bytes = match read_limited_bytes(response, self.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return FetchResult {
                    error: Some(e),
                    status: Some(status),
                    ..FetchResult::default()
                }
            }
        };

        let checksum = format!("{:x}", Sha256::digest(&bytes));
        let (feed, error) = match parse_feed(&bytes) {
            Ok(feed) => (Some(feed), None),
            Err(e) => (None, Some(FetchError::Feed(e))),
        };
        let duration = start.elapsed();

        tracing::debug!(
            url = %self.url,
            status = status,
            bytes = bytes.len(),
            elapsed_ms = duration.as_millis() as u64,
            parsed = feed.is_some(),
            "Feed fetched"
        );

        FetchResult {
            error,
            status: Some(status),
            feed,
            checksum: Some(checksum),
            duration,
        }
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE),
    );

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .danger_accept_invalid_certs(true)
        .no_gzip()
        .no_brotli()
        .no_deflate()
        .tcp_keepalive(Duration::from_secs(60))
        .connect_timeout(timeout)
        .build()
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if usize::try_from(len).map_or(true, |len| len > limit) {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
