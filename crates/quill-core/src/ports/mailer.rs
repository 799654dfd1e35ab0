//! Outgoing mail port.

use async_trait::async_trait;
use serde::Serialize;

/// A plain-text transactional email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

/// Mail transport - abstraction over delivery backends (console, HTTP API).
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a message. Failures are reported, never swallowed.
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// Mail delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail backend unreachable: {0}")]
    Connection(String),

    #[error("Mail rejected by backend: {0}")]
    Rejected(String),
}
