//! GitHub Actions job summary channel.

use crate::format::markdown_summary;
use crate::{AlertChannel, NotifyError};
use async_trait::async_trait;
use pricewatch_engine::Alert;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Appends a markdown table to the file named by `GITHUB_STEP_SUMMARY`.
pub struct GithubSummaryChannel {
    path: PathBuf,
}

impl GithubSummaryChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AlertChannel for GithubSummaryChannel {
    fn name(&self) -> &'static str {
        "github_summary"
    }

    async fn send(&self, alerts: &[Alert]) -> Result<(), NotifyError> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(markdown_summary(alerts).as_bytes()).await?;
        file.flush().await?;

        info!(count = alerts.len(), "Wrote alerts to GitHub job summary");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::tests::sample_alert;

    #[tokio::test]
    async fn test_appends_to_existing_summary() {
        let path = std::env::temp_dir().join(format!("pricewatch-summary-{}.md", std::process::id()));
        std::fs::write(&path, "# Earlier step\n").unwrap();

        let channel = GithubSummaryChannel::new(&path);
        channel.send(&[sample_alert(1)]).await.unwrap();
        channel.send(&[sample_alert(2)]).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(written.starts_with("# Earlier step\n## 🚨 Price Change Alerts"));
        assert_eq!(written.matches("*1 alerts generated*").count(), 2);
        assert!(written.contains("Powerbeats Pro 2 #2"));
    }
}
