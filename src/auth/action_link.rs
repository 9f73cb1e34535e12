/// Action-Link Service
///
/// Short-lived signed links mailed to a user for password reset and email
/// confirmation. A link carries only the email address and its purpose.
/// Nothing is stored when a link is issued or used:
/// - a reset link re-applies the same password until it expires
/// - a confirmation link stops working once the account is active

use std::sync::Arc;

use crate::auth::claims::{ActionLinkClaims, LinkPurpose};
use crate::auth::jwt::{TokenCodec, TokenFamily};
use crate::auth::password::hash_password_blocking;
use crate::email::{EmailMessage, EmailTransport, SenderEmail};
use crate::error::{AppError, AuthError};
use crate::store::UserStore;
use crate::validators::is_valid_email;

pub struct ActionLinkService {
    codec: Arc<TokenCodec>,
    store: Arc<dyn UserStore>,
    transport: Arc<dyn EmailTransport>,
    sender: SenderEmail,
    ui_url: String,
    cost: u32,
}

impl ActionLinkService {
    pub fn new(
        codec: Arc<TokenCodec>,
        store: Arc<dyn UserStore>,
        transport: Arc<dyn EmailTransport>,
        sender: SenderEmail,
        ui_url: String,
        cost: u32,
    ) -> Self {
        Self {
            codec,
            store,
            transport,
            sender,
            ui_url,
            cost,
        }
    }

    /// Sign a link for `email` and mail it. Returns the URL that was sent.
    pub async fn issue(&self, email: &str, purpose: LinkPurpose) -> Result<String, AppError> {
        let claims = ActionLinkClaims {
            email: email.to_string(),
            purpose,
        };
        let token = self.codec.issue(&claims, TokenFamily::ActionLink).await?;
        let url = self.link_url(purpose, &token.value);

        let message = EmailMessage {
            from: self.sender.inner().to_string(),
            to: email.to_string(),
            subject: purpose.subject().to_string(),
            text: format!("{} {}", purpose.intro(), url),
        };
        self.transport.send(&message).await?;

        tracing::info!(purpose = ?purpose, "Action link sent");
        Ok(url)
    }

    /// Check a link token and return the email it was issued for
    ///
    /// # Errors
    /// `TokenExpired`, `TokenInvalid`, or `PurposeMismatch` when the link was issued for another action
    pub async fn consume(&self, token: &str, purpose: LinkPurpose) -> Result<String, AppError> {
        let payload = self
            .codec
            .verify_family::<ActionLinkClaims>(token, TokenFamily::ActionLink)
            .await?;

        if payload.claims.purpose != purpose {
            tracing::warn!(
                expected = ?purpose,
                actual = ?payload.claims.purpose,
                "Action link used for the wrong purpose"
            );
            return Err(AppError::Auth(AuthError::PurposeMismatch));
        }
        Ok(payload.claims.email)
    }

    /// Mail a link if the account exists; unknown addresses are ignored silently
    pub async fn request(&self, email: &str, purpose: LinkPurpose) -> Result<(), AppError> {
        let email = is_valid_email(email)?;

        let user = match self.store.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                tracing::info!(purpose = ?purpose, "Action link requested for unknown address");
                return Ok(());
            }
        };

        if purpose == LinkPurpose::Confirm && user.active {
            tracing::info!(user_id = %user.id, "Confirmation requested for active account");
            return Ok(());
        }

        self.issue(&user.email, purpose).await.map(|_| ())
    }

    /// Apply a reset link: store the new password and end every session
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        let email = self.consume(token, LinkPurpose::Reset).await?;

        let user = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(AppError::Auth(AuthError::TokenInvalid))?;

        let password_hash = hash_password_blocking(new_password.to_string(), self.cost).await?;
        if !self.store.update_password(&email, &password_hash).await? {
            return Err(AppError::Auth(AuthError::TokenInvalid));
        }
        self.store.update_refresh_token_hash(user.id, None).await?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    /// Apply a confirmation link
    ///
    /// # Errors
    /// `AlreadyConfirmed` if the account was already active
    pub async fn confirm_email(&self, token: &str) -> Result<(), AppError> {
        let email = self.consume(token, LinkPurpose::Confirm).await?;

        if self.store.set_active(&email).await? {
            tracing::info!("Email confirmed");
            return Ok(());
        }

        match self.store.find_by_email(&email).await? {
            Some(_) => Err(AppError::Auth(AuthError::AlreadyConfirmed)),
            None => Err(AppError::Auth(AuthError::TokenInvalid)),
        }
    }

    fn link_url(&self, purpose: LinkPurpose, token: &str) -> String {
        format!(
            "{}{}?token={}",
            self.ui_url.trim_end_matches('/'),
            purpose.path(),
            urlencoding::encode(token)
        )
    }
}
