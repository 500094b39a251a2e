//! AI API: schema-driven extraction, used when no scraper is configured.

use crate::provider::{post_json, ScrapeProvider};
use crate::response::unwrap_ai;
use crate::FeedError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

pub struct AiApiProvider {
    http: reqwest::Client,
    token: String,
    timeout_secs: u64,
}

impl AiApiProvider {
    const ENDPOINT: &'static str = "https://app.mrscraper.com/api/ai";
    const DEFAULT_TIMEOUT_SECS: u64 = 180;
    const TIMEOUT_SLACK_SECS: u64 = 30;
    const MIN_RESULTS: u32 = 5;
    const MAX_RESULTS: u32 = 50;

    pub fn new(http: reqwest::Client, token: impl Into<String>) -> Self {
        Self {
            http,
            token: token.into(),
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn request_body(&self, url: &str) -> Value {
        json!({
            "urls": [url],
            "min": Self::MIN_RESULTS,
            "max": Self::MAX_RESULTS,
            "timeout": self.timeout_secs,
            "schema": price_schema(),
        })
    }
}

#[async_trait]
impl ScrapeProvider for AiApiProvider {
    fn name(&self) -> &'static str {
        "ai"
    }

    async fn fetch(&self, url: &str) -> Result<Vec<Value>, FeedError> {
        info!(url, timeout = self.timeout_secs, "AI API request");

        let request = self
            .http
            .post(Self::ENDPOINT)
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(self.timeout_secs + Self::TIMEOUT_SLACK_SECS));
        let response = post_json(request, &self.request_body(url)).await?;

        let products = unwrap_ai(response);
        info!(count = products.len(), "AI API extracted products");
        Ok(products)
    }
}

/// Output schema asked of the AI extractor.
pub fn price_schema() -> Value {
    json!({
        "type": "array",
        "description": "List of products with pricing information",
        "items": {
            "type": "object",
            "description": "Individual product pricing data",
            "properties": {
                "product_name": {"type": "string", "description": "Full product name/title"},
                "current_price": {"type": "number", "description": "Current selling price (after discounts)"},
                "original_price": {"type": "number", "description": "Original/list price before discounts (if available)"},
                "currency": {"type": "string", "description": "Price currency code (e.g. USD, EUR)"},
                "in_stock": {"type": "boolean", "description": "Whether the product is currently in stock"},
                "product_url": {"type": "string", "description": "Direct URL to the product page"},
                "seller": {"type": "string", "description": "Seller or retailer name if shown on the page"}
            },
            "required": ["product_name", "current_price", "currency"]
        }
    })
}
