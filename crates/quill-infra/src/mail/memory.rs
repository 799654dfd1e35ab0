//! In-memory outbox - records sent messages; can be switched to fail.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use quill_core::ports::{MailError, MailMessage, Mailer};

/// Mailer that keeps messages in memory.
#[derive(Default)]
pub struct InMemoryMailer {
    outbox: Mutex<Vec<MailMessage>>,
    failing: AtomicBool,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail with a connection error.
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages sent so far.
    pub async fn sent(&self) -> Vec<MailMessage> {
        self.outbox.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Connection("outbox unavailable".to_string()));
        }
        self.outbox.lock().await.push(message);
        Ok(())
    }
}
