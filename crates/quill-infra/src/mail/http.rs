//! HTTP mail API transport - posts messages as JSON to a delivery service.

use std::time::Duration;

use async_trait::async_trait;

use quill_core::ports::{MailError, MailMessage, Mailer};

/// Configuration of the HTTP mail transport.
#[derive(Debug, Clone)]
pub struct HttpMailerConfig {
    /// Endpoint accepting `{from, to, subject, text}` JSON.
    pub url: String,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Mailer that delivers through an HTTP mail API.
pub struct HttpMailer {
    config: HttpMailerConfig,
    client: reqwest::Client,
}

impl HttpMailer {
    pub fn new(config: HttpMailerConfig) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MailError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        let mut request = self.client.post(&self.config.url).json(&message);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MailError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "Mail API rejected message");
            return Err(MailError::Rejected(format!("{}: {}", status, body)));
        }

        tracing::info!(recipients = message.to.len(), "Mail delivered via HTTP API");
        Ok(())
    }
}
