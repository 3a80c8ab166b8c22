use crate::feed::normalize::{normalize, Article, NormalizePolicy};
use crate::feed::parser::{parse_feed, RawEntry};
use crate::util::{validate_url, UrlValidationError};
use futures::StreamExt;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const MAX_RETRIES: u32 = 3;
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Errors that can occur while retrieving or parsing one feed.
///
/// None of these ever leave [`fetch_one`]: they are logged and the source
/// contributes zero articles.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// One remote feed endpoint. Always an absolute http(s) URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedSource(Url);

impl FeedSource {
    pub fn parse(url: &str) -> Result<Self, UrlValidationError> {
        validate_url(url).map(Self)
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Retrieves and parses a feed into raw entries.
///
/// Implementations must be stateless per call so the aggregator can call
/// them back to back (or concurrently) without coordination.
pub trait FeedReader: Send + Sync {
    fn read(
        &self,
        source: &FeedSource,
    ) -> impl Future<Output = Result<Vec<RawEntry>, FetchError>> + Send;
}

/// [`FeedReader`] over HTTP with retry on 429/5xx and a body size cap.
#[derive(Debug, Clone)]
pub struct HttpFeedReader {
    client: reqwest::Client,
    timeout: Duration,
    backoff: Duration,
}

impl HttpFeedReader {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Per-request timeout. Bounds how long one hung source can stall a refresh.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base delay for exponential backoff (base, 2x base, 4x base).
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn download(&self, source: &FeedSource) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            let response =
                tokio::time::timeout(self.timeout, self.client.get(source.as_str()).send())
                    .await
                    .map_err(|_| FetchError::Timeout)?
                    .map_err(FetchError::Network)?;

            let status = response.status();
            let retryable = status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || status.is_server_error();

            if retryable {
                if retry_count >= MAX_RETRIES {
                    return Err(if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        FetchError::RateLimited(MAX_RETRIES)
                    } else {
                        FetchError::HttpStatus(status.as_u16())
                    });
                }

                let delay = self.backoff * 2u32.pow(retry_count);
                tracing::warn!(
                    feed = %source,
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Feed request failed, retrying after delay"
                );

                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            // 4xx errors fail immediately
            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            match read_limited_bytes(response, MAX_FEED_SIZE).await {
                Ok(bytes) => return Ok(bytes),
                Err(FetchError::IncompleteResponse { expected, received }) => {
                    if retry_count >= MAX_RETRIES {
                        return Err(FetchError::IncompleteResponse { expected, received });
                    }

                    let delay = self.backoff * 2u32.pow(retry_count);
                    tracing::debug!(
                        feed = %source,
                        expected = expected,
                        received = received,
                        attempt = retry_count + 1,
                        "Retrying incomplete download"
                    );

                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl FeedReader for HttpFeedReader {
    async fn read(&self, source: &FeedSource) -> Result<Vec<RawEntry>, FetchError> {
        let bytes = self.download(source).await?;
        parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
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

/// What one source contributed to an aggregation run.
#[derive(Debug)]
pub struct FeedOutcome {
    pub source: FeedSource,
    /// Accepted articles in feed order
    pub articles: Vec<Article>,
    /// Entries the normalizer turned down
    pub rejected: usize,
    /// Set when the source could not be retrieved or parsed
    pub error: Option<FetchError>,
}

/// Fetch one source and normalize its entries.
///
/// Never fails: a retrieval or parse error is logged and reported through
/// [`FeedOutcome::error`] with an empty article list. Bad entries are
/// skipped individually.
pub async fn fetch_one<R: FeedReader>(
    reader: &R,
    source: &FeedSource,
    policy: &NormalizePolicy,
) -> FeedOutcome {
    let entries = match reader.read(source).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(feed = %source, error = %e, "Error fetching feed");
            return FeedOutcome {
                source: source.clone(),
                articles: Vec::new(),
                rejected: 0,
                error: Some(e),
            };
        }
    };

    let total = entries.len();
    let (articles, rejections): (Vec<_>, Vec<_>) = entries
        .iter()
        .map(|entry| normalize(entry, policy))
        .partition(Result::is_ok);

    let articles: Vec<Article> = articles.into_iter().filter_map(Result::ok).collect();
    for rejection in rejections.iter().filter_map(|r| r.as_ref().err()) {
        tracing::trace!(feed = %source, reason = %rejection, "Entry skipped");
    }

    tracing::debug!(
        feed = %source,
        entries = total,
        accepted = articles.len(),
        rejected = rejections.len(),
        "Feed processed"
    );

    FeedOutcome {
        source: source.clone(),
        articles,
        rejected: rejections.len(),
        error: None,
    }
}
