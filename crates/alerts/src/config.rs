//! Channel configuration types.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_SMTP_PORT: u16 = 587;

/// Payload layout expected by the webhook endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WebhookFormat {
    #[default]
    Slack,
    Discord,
    /// Plain `{"alerts": [...]}` for custom receivers
    Json,
}

impl FromStr for WebhookFormat {
    type Err = std::convert::Infallible;

    /// Unrecognized names fall back to the generic JSON payload.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "slack" => WebhookFormat::Slack,
            "discord" => WebhookFormat::Discord,
            _ => WebhookFormat::Json,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    pub url: String,
    pub format: WebhookFormat,
}

#[derive(Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub to: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("to", &self.to)
            .finish()
    }
}

/// Which optional channels are enabled. The console channel is always on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelConfig {
    /// File receiving the GitHub Actions job summary
    pub github_summary: Option<PathBuf>,
    pub webhook: Option<WebhookConfig>,
    pub email: Option<EmailConfig>,
}

impl ChannelConfig {
    /// Read channel settings from the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let webhook = get("ALERT_WEBHOOK_URL").map(|url| WebhookConfig {
            url,
            format: get("ALERT_WEBHOOK_FORMAT")
                .and_then(|format| format.parse().ok())
                .unwrap_or_default(),
        });

        let email = match (get("SMTP_HOST"), get("ALERT_EMAIL_TO")) {
            (Some(host), Some(to)) => Some(EmailConfig {
                host,
                port: get("SMTP_PORT")
                    .and_then(|port| port.parse().ok())
                    .unwrap_or(DEFAULT_SMTP_PORT),
                username: get("SMTP_USER").unwrap_or_default(),
                password: get("SMTP_PASS").unwrap_or_default(),
                to,
            }),
            _ => None,
        };

        Self {
            github_summary: get("GITHUB_STEP_SUMMARY").map(PathBuf::from),
            webhook,
            email,
        }
    }
}
