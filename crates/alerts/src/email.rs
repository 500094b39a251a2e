//! Email digest over SMTP with STARTTLS.

use crate::format::{email_html, email_text, headline};
use crate::{AlertChannel, EmailConfig, NotifyError};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use pricewatch_engine::Alert;
use tracing::info;

pub struct EmailChannel {
    config: EmailConfig,
}

impl EmailChannel {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn mailbox(address: &str) -> Result<Mailbox, NotifyError> {
        address
            .parse()
            .map_err(|_| NotifyError::Address(address.to_string()))
    }

    /// Digest with a plain-text body and an HTML alternative.
    pub fn build_message(&self, alerts: &[Alert]) -> Result<Message, NotifyError> {
        Message::builder()
            .from(Self::mailbox(&self.config.username)?)
            .to(Self::mailbox(&self.config.to)?)
            .subject(headline(alerts.len()))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email_text(alerts)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email_html(alerts)),
                    ),
            )
            .map_err(|e| NotifyError::Email(e.to_string()))
    }
}

#[async_trait]
impl AlertChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, alerts: &[Alert]) -> Result<(), NotifyError> {
        let message = self.build_message(alerts)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|e| NotifyError::Email(e.to_string()))?
            .port(self.config.port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .build();

        mailer
            .send(message)
            .await
            .map_err(|e| NotifyError::Email(e.to_string()))?;

        info!(to = %self.config.to, "Email alert sent");
        Ok(())
    }
}
