//! Application configuration.

use pricewatch_core::{ProductTarget, ValidationError};
use pricewatch_engine::{AlertThreshold, ThresholdError, DEFAULT_THRESHOLD_PCT};
use pricewatch_feeds::ScrapeSettings;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_DB_DIR: &str = "data";
pub const DB_FILE_NAME: &str = "prices.db";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Config must list at least one retailer target")]
    NoRetailers,
    #[error("Retailer {retailer:?} has an invalid URL {url:?}: {source}")]
    InvalidUrl {
        retailer: String,
        url: String,
        source: url::ParseError,
    },
    #[error("Invalid retailer target: {0}")]
    InvalidTarget(#[from] ValidationError),
    #[error("Invalid alert threshold: {0}")]
    Threshold(#[from] ThresholdError),
    #[error("scraping.concurrency must be at least 1")]
    Concurrency,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Pages to scrape.
    pub retailers: Vec<ProductTarget>,
    /// Provider request parameters.
    #[serde(default)]
    pub scraping: ScrapeSettings,
    #[serde(default)]
    pub alerts: AlertSettings,
}

/// Alert settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AlertSettings {
    /// Minimum percentage move that raises a price alert.
    pub threshold_pct: f64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            threshold_pct: DEFAULT_THRESHOLD_PCT,
        }
    }
}

impl AppConfig {
    /// Read, parse and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&text)?;
        config.validate()?;

        info!(
            targets = config.retailers.len(),
            path = %path.display(),
            "Loaded config"
        );
        Ok(config)
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retailers.is_empty() {
            return Err(ConfigError::NoRetailers);
        }
        for target in &self.retailers {
            target.id()?;
            Url::parse(target.url.trim()).map_err(|source| ConfigError::InvalidUrl {
                retailer: target.retailer.clone(),
                url: target.url.clone(),
                source,
            })?;
        }
        if self.scraping.concurrency == 0 {
            return Err(ConfigError::Concurrency);
        }
        self.threshold()?;
        Ok(())
    }

    /// Threshold from the config file.
    pub fn threshold(&self) -> Result<AlertThreshold, ThresholdError> {
        AlertThreshold::new(self.alerts.threshold_pct)
    }
}

/// Config file location: explicit flag, then `CONFIG_PATH`, then `config.json`.
pub fn config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env::var_os("CONFIG_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Database location: explicit flag, then `DB_DIR/prices.db`, then `data/prices.db`.
pub fn database_path(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| {
        env::var_os("DB_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_DIR))
            .join(DB_FILE_NAME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<AppConfig, ConfigError> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse(
            r#"{"retailers": [{"retailer": "Amazon", "url": "https://www.amazon.com/dp/B0DT2344N3"}]}"#,
        )
        .unwrap();
        assert_eq!(config.scraping, ScrapeSettings::default());
        assert_eq!(config.alerts.threshold_pct, 5.0);
        assert_eq!(config.retailers[0].category, "general");
        assert_eq!(config.threshold().unwrap().pct(), 5.0);
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"{
                "retailers": [
                    {"retailer": "Best Buy", "url": "https://www.bestbuy.com/site/6577331",
                     "category": "audio", "scraper_id": "abc"}
                ],
                "scraping": {"max_retry": 1, "max_pages": 2, "timeout": 120, "stream": true, "concurrency": 2},
                "alerts": {"threshold_pct": 10}
            }"#,
        )
        .unwrap();
        assert_eq!(config.scraping.concurrency, 2);
        assert_eq!(config.retailers[0].configured_scraper_id(), Some("abc"));
        assert_eq!(config.threshold().unwrap().pct(), 10.0);
    }

    #[test]
    fn test_rejects_bad_configs() {
        assert!(matches!(parse(r#"{"retailers": []}"#), Err(ConfigError::NoRetailers)));
        assert!(matches!(
            parse(r#"{"retailers": [{"retailer": "A", "url": "https://a.test"}], "extra": 1}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            parse(r#"{"retailers": [{"retailer": "A", "url": "a.test/x"}]}"#),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse(r#"{"retailers": [{"retailer": " ", "url": "https://a.test"}]}"#),
            Err(ConfigError::InvalidTarget(ValidationError::EmptyField("retailer")))
        ));
        assert!(matches!(
            parse(r#"{"retailers": [{"retailer": "A", "url": "https://a.test"}], "alerts": {"threshold_pct": 0}}"#),
            Err(ConfigError::Threshold(ThresholdError::NotPositive(_)))
        ));
        assert!(matches!(
            parse(r#"{"retailers": [{"retailer": "A", "url": "https://a.test"}], "scraping": {"concurrency": 0}}"#),
            Err(ConfigError::Concurrency)
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_explicit_paths_win() {
        assert_eq!(config_path(Some("x.json".into())), PathBuf::from("x.json"));
        assert_eq!(database_path(Some("db.sqlite".into())), PathBuf::from("db.sqlite"));
    }
}
