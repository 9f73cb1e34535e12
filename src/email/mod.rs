/// Email transport
///
/// Outbound mail is a capability: anything that can `send` an `EmailMessage`.
/// The concrete transport is picked once at startup from `email.transport`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::configuration::{EmailSettings, TransportKind};
use crate::error::{AppError, EmailError};
use crate::validators::is_valid_email;

mod http;
mod logged;

pub use self::http::HttpEmailTransport;
pub use self::logged::LogEmailTransport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// A validated sender address
#[derive(Debug, Clone)]
pub struct SenderEmail(String);

impl SenderEmail {
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        is_valid_email(s)
            .map(Self)
            .map_err(|e| EmailError::ConfigurationError(format!("sender: {}", e)))
    }

    pub fn inner(&self) -> &str {
        &self.0
    }
}

/// Build the transport named by the settings
pub fn build_transport(settings: &EmailSettings) -> Result<Arc<dyn EmailTransport>, AppError> {
    match settings.transport {
        TransportKind::Http => {
            let base_url = settings.base_url.clone().ok_or_else(|| {
                EmailError::ConfigurationError("email.base_url is not set".to_string())
            })?;
            let http_client = reqwest::Client::builder()
                .timeout(settings.timeout())
                .build()
                .map_err(|e| EmailError::ConfigurationError(e.to_string()))?;
            tracing::info!(base_url = %base_url, "Using HTTP email transport");
            Ok(Arc::new(HttpEmailTransport::new(
                base_url,
                settings.authorization_token.clone(),
                http_client,
            )))
        }
        TransportKind::Log => {
            tracing::info!("Using logging email transport; mail is not delivered");
            Ok(Arc::new(LogEmailTransport))
        }
    }
}
