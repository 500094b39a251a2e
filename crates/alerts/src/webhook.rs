//! Webhook channel for Slack, Discord and custom receivers.

use crate::format::{discord_payload, json_payload, slack_payload};
use crate::{AlertChannel, NotifyError, WebhookConfig, WebhookFormat};
use async_trait::async_trait;
use pricewatch_engine::Alert;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

pub struct WebhookChannel {
    http: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookChannel {
    const TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(config: WebhookConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn payload(&self, alerts: &[Alert]) -> Value {
        match self.config.format {
            WebhookFormat::Slack => slack_payload(alerts),
            WebhookFormat::Discord => discord_payload(alerts),
            WebhookFormat::Json => json_payload(alerts),
        }
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, alerts: &[Alert]) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(&self.config.url)
            .timeout(Self::TIMEOUT)
            .json(&self.payload(alerts))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(format = ?self.config.format, "Webhook notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::tests::sample_alert;

    fn channel(format: WebhookFormat) -> WebhookChannel {
        WebhookChannel::new(WebhookConfig {
            url: "https://hooks.example.test/alerts".to_string(),
            format,
        })
    }

    #[test]
    fn test_payload_follows_format() {
        let alerts = [sample_alert(1)];
        assert!(channel(WebhookFormat::Slack).payload(&alerts).get("blocks").is_some());
        assert!(channel(WebhookFormat::Discord).payload(&alerts).get("embeds").is_some());
        assert!(channel(WebhookFormat::Json).payload(&alerts).get("alerts").is_some());
    }
}
