//! Outbound invoice mail transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use super::error::MailError;
use crate::sanitize::redact_email;

/// One rendered invoice ready to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &InvoiceEmail) -> Result<(), MailError>;
}

/// Posts each email as JSON to an HTTP mail relay.
pub struct HttpMailer {
    client: Client,
    relay_url: String,
}

impl HttpMailer {
    pub fn new(relay_url: impl Into<String>, timeout: Duration) -> Result<Self, MailError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            relay_url: relay_url.into(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &InvoiceEmail) -> Result<(), MailError> {
        debug!(to = %redact_email(&email.to), "Posting invoice to mail relay");

        let response = self.client.post(&self.relay_url).json(email).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Logs instead of sending. Used when no mail relay is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &InvoiceEmail) -> Result<(), MailError> {
        info!(
            to = %redact_email(&email.to),
            subject = %email.subject,
            bytes = email.html.len(),
            "Invoice email logged, no relay configured"
        );
        Ok(())
    }
}
