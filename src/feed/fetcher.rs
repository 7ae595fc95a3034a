use crate::config::Config;
use crate::feed::parser::{parse_feed, ParsedFeed};
use crate::storage::{Database, DatabaseError, Feed};
use crate::util::{validate_feed_url, UrlValidationError};
use futures::stream::{self, StreamExt};
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_REDIRECTS: usize = 3;

/// Errors from downloading a feed document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS, connection, TLS or redirect failure
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-2xx response
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out")]
    Timeout,
    /// Body exceeded the 10MB cap
    #[error("Response too large")]
    ResponseTooLarge,
    /// Fewer bytes than Content-Length announced
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Pipeline stage an ingestion failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    FetchFailed,
    ParseFailed,
    PersistFailed,
}

/// Failure to subscribe to or refresh a feed.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Database error: {0}")]
    Persist(#[from] DatabaseError),
}

impl IngestError {
    /// A rejected URL counts as a fetch failure: nothing was retrieved.
    pub fn stage(&self) -> IngestStage {
        match self {
            IngestError::InvalidUrl(_) | IngestError::Fetch(_) => IngestStage::FetchFailed,
            IngestError::Parse(_) => IngestStage::ParseFailed,
            IngestError::Persist(_) => IngestStage::PersistFailed,
        }
    }
}

/// Outcome of refreshing one feed.
#[derive(Debug)]
pub struct FetchResult {
    pub feed_id: i64,
    /// Number of new articles inserted
    pub result: Result<usize, IngestError>,
}

/// Redirect policy for feed downloads.
///
/// - At most 3 hops
/// - A URL appearing twice in the chain is a loop
fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// HTTP client shared by every feed download.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("newshub/", env!("CARGO_PKG_VERSION")))
        .redirect(redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}

/// Downloads, parses and stores feeds.
///
/// One GET per call with no retries; a failed feed is simply tried again on
/// the next refresh round.
#[derive(Clone)]
pub struct FeedFetcher {
    db: Database,
    client: reqwest::Client,
    timeout: Duration,
    concurrency: usize,
    allow_private_hosts: bool,
}

impl FeedFetcher {
    pub fn new(db: Database, client: reqwest::Client, config: &Config) -> Self {
        Self {
            db,
            client,
            timeout: config.fetch_timeout(),
            concurrency: config.refresh_concurrency.max(1),
            allow_private_hosts: config.allow_private_hosts,
        }
    }

    /// Subscribe `user_id` to the feed at `url`.
    ///
    /// The document must download and parse before anything is stored. The
    /// feed is named after its channel title, falling back to the URL, and
    /// the entries already parsed are stored right away. Returns the new feed id.
    pub async fn add_feed(&self, url: &str, user_id: i64) -> Result<i64, IngestError> {
        let url = validate_feed_url(url, self.allow_private_hosts)?;
        let parsed = self.fetch_and_parse(url.as_str()).await?;

        let name = parsed.title.unwrap_or_else(|| url.to_string());
        let feed_id = self.db.insert_feed(user_id, &name, url.as_str()).await?;
        let inserted = self.db.insert_articles(feed_id, &parsed.articles).await?;

        tracing::info!(feed_id, user_id, url = %url, inserted, "Subscribed to feed");
        Ok(feed_id)
    }

    /// Fetch `feed` and insert entries not seen before.
    pub async fn refresh_feed(&self, feed: &Feed) -> Result<usize, IngestError> {
        let parsed = self.fetch_and_parse(&feed.url).await?;
        let inserted = self.db.insert_articles(feed.id, &parsed.articles).await?;
        tracing::debug!(feed_id = feed.id, inserted, "Refreshed feed");
        Ok(inserted)
    }

    /// Refresh every feed on a bounded pool.
    ///
    /// Results are in completion order, one per input feed.
    pub async fn refresh_all(&self, feeds: Vec<Feed>) -> Vec<FetchResult> {
        let results: Vec<FetchResult> = stream::iter(feeds)
            .map(|feed| async move {
                let result = self.refresh_feed(&feed).await;
                if let Err(e) = &result {
                    tracing::warn!(
                        feed_id = feed.id,
                        url = %feed.url,
                        stage = ?e.stage(),
                        error = %e,
                        "Feed refresh failed"
                    );
                }
                FetchResult {
                    feed_id: feed.id,
                    result,
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let failed = results.iter().filter(|r| r.result.is_err()).count();
        tracing::info!(total = results.len(), failed, "Refresh round complete");
        results
    }

    async fn fetch_and_parse(&self, url: &str) -> Result<ParsedFeed, IngestError> {
        let bytes = fetch_document(&self.client, url, self.timeout).await?;
        parse_feed(&bytes).map_err(|e| IngestError::Parse(e.to_string()))
    }
}

/// One GET of `url`, bounded by `timeout` for headers and body together.
pub async fn fetch_document(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    tokio::time::timeout(timeout, download(client, url))
        .await
        .map_err(|_| FetchError::Timeout)?
}

async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }
    read_limited_bytes(response, MAX_FEED_SIZE).await
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: reject on the header alone
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
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
