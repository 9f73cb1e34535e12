use async_trait::async_trait;

use super::{EmailMessage, EmailTransport};
use crate::error::EmailError;

/// Development transport: writes the message to the log instead of delivering it
pub struct LogEmailTransport;

#[async_trait]
impl EmailTransport for LogEmailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Email not delivered (log transport)"
        );
        tracing::debug!(body = %message.text, "Email body");
        Ok(())
    }
}
