//! Alert dispatch.

use crate::{
    ChannelConfig, ConsoleChannel, EmailChannel, GithubSummaryChannel, WebhookChannel,
};
use async_trait::async_trait;
use pricewatch_engine::Alert;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Webhook returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid email address {0:?}")]
    Address(String),
    #[error("Email error: {0}")]
    Email(String),
}

/// A destination for alert batches.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Name reported in the dispatch summary.
    fn name(&self) -> &'static str;

    async fn send(&self, alerts: &[Alert]) -> Result<(), NotifyError>;
}

/// What a dispatch reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub channels_notified: Vec<&'static str>,
    pub alerts_count: usize,
    /// `channel: reason` for every channel that failed
    pub errors: Vec<String>,
}

/// Routes alert batches to every configured channel.
pub struct Dispatcher {
    channels: Vec<Box<dyn AlertChannel>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn AlertChannel>>) -> Self {
        Self { channels }
    }

    /// Console plus whatever `config` enables.
    pub fn from_config(config: ChannelConfig) -> Self {
        let mut channels: Vec<Box<dyn AlertChannel>> = Vec::new();
        channels.push(Box::new(ConsoleChannel));
        if let Some(path) = config.github_summary {
            channels.push(Box::new(GithubSummaryChannel::new(path)));
        }
        if let Some(webhook) = config.webhook {
            channels.push(Box::new(WebhookChannel::new(webhook)));
        }
        if let Some(email) = config.email {
            channels.push(Box::new(EmailChannel::new(email)));
        }
        Self { channels }
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|channel| channel.name()).collect()
    }

    /// Send `alerts` to each channel in turn. A failing channel is recorded
    /// in the summary and does not stop the others.
    pub async fn dispatch(&self, alerts: &[Alert]) -> DispatchSummary {
        let mut summary = DispatchSummary {
            alerts_count: alerts.len(),
            ..DispatchSummary::default()
        };
        if alerts.is_empty() {
            info!("No alerts to send");
            return summary;
        }

        for channel in &self.channels {
            match channel.send(alerts).await {
                Ok(()) => summary.channels_notified.push(channel.name()),
                Err(e) => {
                    error!(channel = channel.name(), error = %e, "Notification failed");
                    summary.errors.push(format!("{}: {}", channel.name(), e));
                }
            }
        }

        info!(
            alerts = alerts.len(),
            channels = %summary.channels_notified.join(", "),
            failed = summary.errors.len(),
            "Alerts dispatched"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::tests::sample_alert;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Recording {
        sent: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AlertChannel for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, alerts: &[Alert]) -> Result<(), NotifyError> {
            self.sent.fetch_add(alerts.len(), Ordering::SeqCst);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl AlertChannel for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn send(&self, _alerts: &[Alert]) -> Result<(), NotifyError> {
            Err(NotifyError::Email("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_stop_others() {
        let sent = Arc::new(AtomicUsize::new(0));
        let channels: Vec<Box<dyn AlertChannel>> = vec![
            Box::new(Broken) as Box<dyn AlertChannel>,
            Box::new(Recording { sent: Arc::clone(&sent) }),
        ];
        let dispatcher = Dispatcher::new(channels);

        let summary = dispatcher.dispatch(&[sample_alert(1), sample_alert(2)]).await;
        assert_eq!(
            summary,
            DispatchSummary {
                channels_notified: vec!["recording"],
                alerts_count: 2,
                errors: vec!["broken: Email error: connection refused".to_string()],
            }
        );
        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_notifies_nothing() {
        let sent = Arc::new(AtomicUsize::new(0));
        let recording: Box<dyn AlertChannel> = Box::new(Recording { sent: Arc::clone(&sent) });
        let dispatcher = Dispatcher::new(vec![recording]);

        let summary = dispatcher.dispatch(&[]).await;
        assert_eq!(summary, DispatchSummary::default());
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_from_config_always_has_console() {
        let dispatcher = Dispatcher::from_config(ChannelConfig::default());
        assert_eq!(dispatcher.channel_names(), vec!["console"]);

        let dispatcher = Dispatcher::from_config(ChannelConfig {
            github_summary: Some("summary.md".into()),
            ..ChannelConfig::default()
        });
        assert_eq!(dispatcher.channel_names(), vec!["console", "github_summary"]);
    }
}
