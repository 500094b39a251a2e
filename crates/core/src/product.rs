//! Tracked products and their identity.

use crate::ValidationError;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default category when a target does not name one.
pub const DEFAULT_CATEGORY: &str = "general";

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// Identity of a tracked product: the retailer plus the canonical product URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId {
    pub retailer: CompactString,
    pub url: String,
}

impl ProductId {
    pub fn new(retailer: &str, url: &str) -> Result<Self, ValidationError> {
        let retailer = retailer.trim();
        let url = url.trim();
        if retailer.is_empty() {
            return Err(ValidationError::EmptyField("retailer"));
        }
        if url.is_empty() {
            return Err(ValidationError::EmptyField("url"));
        }
        Ok(Self {
            retailer: CompactString::from(retailer),
            url: url.to_string(),
        })
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.retailer, self.url)
    }
}

/// A retailer page configured for scraping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductTarget {
    /// Retailer display name (e.g. "Amazon")
    pub retailer: String,
    /// Page URL handed to the scraping provider
    pub url: String,
    #[serde(default = "default_category")]
    pub category: String,
    /// Pre-configured extraction job on the provider, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraper_id: Option<String>,
}

impl ProductTarget {
    pub fn new(retailer: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            retailer: retailer.into(),
            url: url.into(),
            category: default_category(),
            scraper_id: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_scraper_id(mut self, scraper_id: impl Into<String>) -> Self {
        self.scraper_id = Some(scraper_id.into());
        self
    }

    /// Identity of the product this target's page describes.
    pub fn id(&self) -> Result<ProductId, ValidationError> {
        ProductId::new(&self.retailer, &self.url)
    }

    /// Configured scraper id, ignoring blank values.
    pub fn configured_scraper_id(&self) -> Option<&str> {
        self.scraper_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}
