//! Scraping provider integration.
//!
//! Triggers extraction jobs on the external scraping provider and turns
//! whatever it returns into validated price observations.

pub mod ai;
pub mod client;
pub mod error;
pub mod normalize;
pub mod provider;
pub mod rerun;
pub mod response;

pub use ai::AiApiProvider;
pub use client::{resolve_scraper_id, Credentials, ScraperClient, TargetScrape};
pub use error::FeedError;
pub use normalize::{normalize_batch, normalize_product};
pub use provider::{ScrapeProvider, ScrapeSettings};
pub use rerun::RerunApiProvider;
