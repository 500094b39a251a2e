//! Provider abstraction.

use crate::FeedError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Slack added on top of the provider's own timeout for the HTTP request.
pub const HTTP_TIMEOUT_SLACK_SECS: u64 = 60;

/// Scraping parameters shared by every target in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScrapeSettings {
    /// Retry attempts performed by the provider
    pub max_retry: u32,
    /// Pages to follow on paginated listings
    pub max_pages: u32,
    /// Provider-side timeout in seconds
    pub timeout: u64,
    /// Stream results for long multi-page scrapes
    pub stream: bool,
    /// Targets fetched in parallel
    pub concurrency: usize,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            max_retry: 3,
            max_pages: 1,
            timeout: 300,
            stream: false,
            concurrency: 4,
        }
    }
}

impl ScrapeSettings {
    /// Client-side timeout for one provider request.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout + HTTP_TIMEOUT_SLACK_SECS)
    }
}

/// A way of asking the provider to extract products from a page.
#[async_trait]
pub trait ScrapeProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Scrape `url` and return the raw product objects found on it.
    async fn fetch(&self, url: &str) -> Result<Vec<serde_json::Value>, FeedError>;
}

/// Send a JSON request and decode the JSON response, mapping non-2xx
/// statuses to errors.
pub(crate) async fn post_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
) -> Result<serde_json::Value, FeedError> {
    let response = request
        .header("Content-Type", "application/json")
        .header("Accept", "application/json")
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FeedError::from_status(status.as_u16(), body));
    }

    Ok(response.json::<serde_json::Value>().await?)
}
