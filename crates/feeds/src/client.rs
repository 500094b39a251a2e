//! Per-target scraping: picks a provider, fetches and normalizes.

use crate::normalize::normalize_batch;
use crate::provider::{ScrapeProvider, ScrapeSettings};
use crate::{AiApiProvider, FeedError, RerunApiProvider};
use chrono::{DateTime, Utc};
use pricewatch_core::{PriceObservation, ProductTarget, ValidationError};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};

/// Provider credentials taken from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_token: Option<String>,
    /// Shared scraper id used by targets that do not configure their own.
    pub default_scraper_id: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            api_token: non_blank_env("MRSCRAPER_API_TOKEN"),
            default_scraper_id: non_blank_env("MRSCRAPER_SCRAPER_ID"),
        }
    }
}

fn non_blank_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Scraper id for a target: its own id first, then the shared default.
/// `None` means the AI API is used.
pub fn resolve_scraper_id<'a>(
    target: &'a ProductTarget,
    default_scraper_id: Option<&'a str>,
) -> Option<&'a str> {
    target
        .configured_scraper_id()
        .or_else(|| default_scraper_id.map(str::trim).filter(|id| !id.is_empty()))
}

/// Outcome of scraping one target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetScrape {
    pub target: ProductTarget,
    pub observations: Vec<PriceObservation>,
    /// Products the provider returned that could not be normalized.
    pub rejected: Vec<ValidationError>,
}

enum Selection {
    Credentials(Credentials),
    Fixed(Arc<dyn ScrapeProvider>),
}

pub struct ScraperClient {
    http: reqwest::Client,
    settings: ScrapeSettings,
    selection: Selection,
}

impl ScraperClient {
    /// Client choosing the provider per target from `credentials`.
    pub fn new(credentials: Credentials, settings: ScrapeSettings) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("price-monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            settings,
            selection: Selection::Credentials(credentials),
        })
    }

    /// Client sending every target to `provider`.
    pub fn with_provider(provider: Arc<dyn ScrapeProvider>, settings: ScrapeSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
            selection: Selection::Fixed(provider),
        }
    }

    pub fn settings(&self) -> &ScrapeSettings {
        &self.settings
    }

    /// Provider used for `target`.
    pub fn provider_for(&self, target: &ProductTarget) -> Result<Arc<dyn ScrapeProvider>, FeedError> {
        let credentials = match &self.selection {
            Selection::Fixed(provider) => return Ok(Arc::clone(provider)),
            Selection::Credentials(credentials) => credentials,
        };
        let token = credentials
            .api_token
            .as_deref()
            .ok_or(FeedError::MissingToken)?;

        match resolve_scraper_id(target, credentials.default_scraper_id.as_deref()) {
            Some(scraper_id) => Ok(Arc::new(RerunApiProvider::new(
                self.http.clone(),
                token,
                scraper_id,
                self.settings.clone(),
            ))),
            None => {
                warn!(
                    retailer = %target.retailer,
                    "No scraper_id configured, falling back to the AI API"
                );
                Ok(Arc::new(AiApiProvider::new(self.http.clone(), token)))
            }
        }
    }

    /// Fetch and normalize the products on `target`'s page.
    pub async fn scrape(
        &self,
        target: &ProductTarget,
        observed_at: DateTime<Utc>,
    ) -> Result<TargetScrape, FeedError> {
        let provider = self.provider_for(target)?;
        let raw = provider.fetch(&target.url).await?;

        let mut observations = Vec::with_capacity(raw.len());
        let mut rejected = Vec::new();
        for result in normalize_batch(raw, target, observed_at) {
            match result {
                Ok(observation) => observations.push(observation),
                Err(err) => {
                    warn!(retailer = %target.retailer, error = %err, "Rejected scraped product");
                    rejected.push(err);
                }
            }
        }

        info!(
            retailer = %target.retailer,
            provider = provider.name(),
            products = observations.len(),
            rejected = rejected.len(),
            "Scraped target"
        );
        Ok(TargetScrape {
            target: target.clone(),
            observations,
            rejected,
        })
    }
}
