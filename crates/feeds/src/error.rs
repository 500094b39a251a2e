//! Error types for provider requests.

use thiserror::Error;

/// Errors that can occur while scraping a target.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("MRSCRAPER_API_TOKEN is not set")]
    MissingToken,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::ParseError(err.to_string())
        } else {
            FeedError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl FeedError {
    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 {
            FeedError::RateLimitExceeded
        } else {
            FeedError::Status { status, body }
        }
    }

    /// Returns true if this error is transient and likely to succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::Request(_) | FeedError::Timeout(_) | FeedError::RateLimitExceeded => true,
            FeedError::Status { status, .. } => *status >= 500,
            FeedError::MissingToken | FeedError::ParseError(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            FeedError::from_status(429, String::new()),
            FeedError::RateLimitExceeded
        ));
        assert!(FeedError::from_status(503, "busy".into()).is_transient());
        assert!(!FeedError::from_status(401, "bad token".into()).is_transient());
        assert!(!FeedError::MissingToken.is_transient());
    }
}
