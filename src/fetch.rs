//! Text fetching: the single network seam every source goes through.

use crate::config::SourceConfig;
use crate::error::SourceError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Performs an HTTP GET and hands back the body as text.
///
/// Implementations must report non-2xx statuses as errors and must not retry;
/// retry policy belongs to the caller.
#[async_trait]
pub trait TextFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, SourceError>;
}

/// `TextFetcher` backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::Client,
    delay_sec: f64,
}

impl HttpFetcher {
    /// Creates a fetcher using the given source settings.
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: create_http_client(config.timeout_sec)?,
            delay_sec: config.delay_between_requests_sec,
        })
    }
}

#[async_trait]
impl TextFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, SourceError> {
        rate_limit(self.delay_sec).await;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Common HTTP client configuration for sources.
pub fn create_http_client(timeout_sec: u64) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/json"),
    );

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .cookie_store(true)
        .timeout(Duration::from_secs(timeout_sec))
        .build()
}

/// Applies rate limiting delay.
pub async fn rate_limit(delay_sec: f64) {
    if delay_sec > 0.0 {
        tokio::time::sleep(Duration::from_secs_f64(delay_sec)).await;
    }
}
