/// Session Issuer
///
/// Login, logout and session start after registration. A session is an access
/// token plus a refresh token whose slow hash is stored on the user record;
/// storing a new hash invalidates whatever refresh token came before it.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::claims::SessionClaims;
use crate::auth::cookies::{CookieManager, SessionCookieSet};
use crate::auth::credentials::CredentialValidator;
use crate::auth::jwt::{IssuedToken, TokenCodec, TokenFamily};
use crate::auth::password::hash_refresh_token;
use crate::error::{AppError, AuthError};
use crate::store::{UserRecord, UserStore};

/// Freshly signed tokens plus the hash to store for the refresh token
pub(crate) struct MintedSession {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
    pub refresh_hash: String,
}

pub struct SessionIssuer {
    store: Arc<dyn UserStore>,
    codec: Arc<TokenCodec>,
    credentials: CredentialValidator,
    cookies: CookieManager,
    cost: u32,
}

impl SessionIssuer {
    pub fn new(
        store: Arc<dyn UserStore>,
        codec: Arc<TokenCodec>,
        credentials: CredentialValidator,
        cookies: CookieManager,
        cost: u32,
    ) -> Self {
        Self {
            store,
            codec,
            credentials,
            cookies,
            cost,
        }
    }

    pub fn cookie_manager(&self) -> &CookieManager {
        &self.cookies
    }

    /// # Errors
    /// `InvalidCredentials` for an unknown user or a wrong password, without saying which
    #[tracing::instrument(name = "Login", skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(UserRecord, SessionCookieSet), AppError> {
        let user = self
            .credentials
            .validate(username, password)
            .await?
            .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

        let cookies = self.start_session(&user).await?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok((user, cookies))
    }

    /// Mint a token pair for `user` and store the refresh hash before handing out cookies
    pub async fn start_session(&self, user: &UserRecord) -> Result<SessionCookieSet, AppError> {
        let minted = self.mint(user.id).await?;
        self.store
            .update_refresh_token_hash(user.id, Some(&minted.refresh_hash))
            .await?;
        Ok(self
            .cookies
            .build_session_cookies(&minted.access, &minted.refresh))
    }

    /// Forget the stored refresh hash. Logging out twice is fine.
    pub async fn logout(&self, user_id: Uuid) -> Result<SessionCookieSet, AppError> {
        self.store.update_refresh_token_hash(user_id, None).await?;
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(self.cookies.build_logout_cookies())
    }

    pub(crate) async fn mint(&self, user_id: Uuid) -> Result<MintedSession, AppError> {
        let access = self
            .codec
            .issue(&SessionClaims::new(user_id), TokenFamily::Access)
            .await?;
        let refresh = self
            .codec
            .issue(&SessionClaims::new(user_id), TokenFamily::Refresh)
            .await?;
        let refresh_hash = hash_refresh_token(&refresh.value, self.cost).await?;

        Ok(MintedSession {
            access,
            refresh,
            refresh_hash,
        })
    }
}
