//! Console channel: alerts go to the run log.

use crate::{AlertChannel, NotifyError};
use async_trait::async_trait;
use pricewatch_engine::Alert;
use tracing::info;

pub struct ConsoleChannel;

#[async_trait]
impl AlertChannel for ConsoleChannel {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, alerts: &[Alert]) -> Result<(), NotifyError> {
        info!("🚨 PRICE CHANGE ALERTS ({} detected)", alerts.len());
        for alert in alerts {
            info!(
                severity = %alert.severity,
                product = %alert.product,
                "{}",
                alert.message()
            );
        }
        Ok(())
    }
}
