//! Console mailer - prints messages to stdout instead of delivering them.

use async_trait::async_trait;

use quill_core::ports::{MailError, MailMessage, Mailer};

/// Development mailer. Every message is written to stdout and logged.
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        println!(
            "Subject: {}\nFrom: {}\nTo: {}\n\n{}\n{}",
            message.subject,
            message.from,
            message.to.join(", "),
            message.text,
            "-".repeat(79)
        );
        tracing::info!(recipients = message.to.len(), "Mail written to console");
        Ok(())
    }
}
