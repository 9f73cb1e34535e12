/// Authentication module
///
/// Token signing, password hashing, session cookies, refresh rotation and
/// action links. `AuthServices` wires them together once at startup.

mod action_link;
mod claims;
mod cookies;
mod credentials;
mod jwt;
mod password;
mod refresh_token;
mod session;

use std::sync::Arc;

pub use action_link::ActionLinkService;
pub use claims::{ActionLinkClaims, LinkPurpose, SessionClaims, TokenPayload};
pub use cookies::{
    CookieManager, SessionCookieSet, ACCESS_COOKIE, REFRESH_COOKIE, REFRESH_EXIST_COOKIE,
};
pub use credentials::CredentialValidator;
pub use jwt::{IssuedToken, TokenCodec, TokenFamily};
pub use password::{hash_password, validate_password_strength, verify_password};
pub use refresh_token::RefreshRotationGuard;
pub use session::SessionIssuer;

use crate::configuration::Settings;
use crate::email::{EmailTransport, SenderEmail};
use crate::error::AppError;
use crate::secrets::SecretResolver;
use crate::store::{NewUser, UserRecord, UserStore};
use crate::validators::{is_valid_email, is_valid_username};

/// Everything the HTTP layer needs, built once and shared between workers
pub struct AuthServices {
    pub store: Arc<dyn UserStore>,
    pub codec: Arc<TokenCodec>,
    pub sessions: Arc<SessionIssuer>,
    pub refresh: RefreshRotationGuard,
    pub links: ActionLinkService,
    cost: u32,
}

impl AuthServices {
    pub fn new(
        store: Arc<dyn UserStore>,
        secrets: Arc<SecretResolver>,
        transport: Arc<dyn EmailTransport>,
        settings: &Settings,
    ) -> Result<Self, AppError> {
        let cost = settings.hashing.cost;
        let codec = Arc::new(TokenCodec::new(secrets, settings.jwt.issuer.clone()));
        let sessions = Arc::new(SessionIssuer::new(
            store.clone(),
            codec.clone(),
            CredentialValidator::new(store.clone(), cost)?,
            CookieManager::from_settings(&settings.cookies),
            cost,
        ));
        let refresh = RefreshRotationGuard::new(
            store.clone(),
            codec.clone(),
            sessions.clone(),
            settings.jwt.revoke_on_reuse,
        );
        let links = ActionLinkService::new(
            codec.clone(),
            store.clone(),
            transport,
            SenderEmail::parse(&settings.email.sender)?,
            settings.application.ui_url.clone(),
            cost,
        );

        Ok(Self {
            store,
            codec,
            sessions,
            refresh,
            links,
            cost,
        })
    }

    /// Create an inactive account, log it in, and mail a confirmation link
    ///
    /// # Errors
    /// Validation failures, or a `UniqueConstraintViolation` naming the taken field
    #[tracing::instrument(name = "Register user", skip(self, email, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(UserRecord, SessionCookieSet), AppError> {
        let username = is_valid_username(username)?;
        let email = is_valid_email(email)?;
        let password_hash = password::hash_password_blocking(password.to_string(), self.cost).await?;

        let user = self
            .store
            .create_user(NewUser {
                username,
                email,
                password_hash,
            })
            .await?;
        tracing::info!(user_id = %user.id, "User registered");

        let cookies = self.sessions.start_session(&user).await?;

        // the account exists either way; resend-verification covers a lost mail
        if let Err(e) = self.links.issue(&user.email, LinkPurpose::Confirm).await {
            tracing::error!(user_id = %user.id, error = %e, "Failed to send confirmation email");
        }

        Ok((user, cookies))
    }
}
