/// Token Codec
///
/// Signs and verifies HS256 JWTs. Each token family has its own named secret,
/// so a token signed for one family never verifies as another.

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::claims::TokenPayload;
use crate::error::{AppError, AuthError, ConfigError};
use crate::secrets::SecretResolver;

/// Which secret and lifetime a token uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFamily {
    Access,
    Refresh,
    ActionLink,
}

impl TokenFamily {
    pub const ALL: [TokenFamily; 3] = [TokenFamily::Access, TokenFamily::Refresh, TokenFamily::ActionLink];

    pub fn secret_name(self) -> &'static str {
        match self {
            TokenFamily::Access => "JWT_SECRET",
            TokenFamily::Refresh => "JWT_REFRESH_SECRET",
            TokenFamily::ActionLink => "JWT_EMAIL_SECRET",
        }
    }

    pub fn ttl_name(self) -> &'static str {
        match self {
            TokenFamily::Access => "JWT_EXPIRATION_TIME",
            TokenFamily::Refresh => "JWT_REFRESH_EXPIRATION_TIME",
            TokenFamily::ActionLink => "JWT_EMAIL_EXPIRATION_TIME",
        }
    }

    /// Every secret name the service needs at startup
    pub fn required_names() -> Vec<&'static str> {
        Self::ALL
            .iter()
            .flat_map(|family| [family.secret_name(), family.ttl_name()])
            .collect()
    }
}

/// A signed token together with the lifetime it was signed with
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub value: String,
    pub ttl_seconds: i64,
}

#[derive(Serialize)]
struct OutgoingClaims<'a, T> {
    #[serde(flatten)]
    claims: &'a T,
    iat: i64,
    exp: i64,
    iss: &'a str,
}

#[derive(Deserialize)]
struct IncomingClaims<T> {
    #[serde(flatten)]
    claims: T,
    iat: i64,
    exp: i64,
}

pub struct TokenCodec {
    secrets: Arc<SecretResolver>,
    issuer: String,
}

impl TokenCodec {
    pub fn new(secrets: Arc<SecretResolver>, issuer: String) -> Self {
        Self { secrets, issuer }
    }

    /// Sign `claims` with the named secret, expiring `ttl_seconds` from now
    ///
    /// # Errors
    /// `ConfigError::Unavailable` if the secret cannot be resolved,
    /// `ConfigError::InvalidValue` if the expiry does not fit a timestamp
    pub async fn sign<T: Serialize>(
        &self,
        claims: &T,
        secret_name: &str,
        ttl_seconds: i64,
    ) -> Result<String, AppError> {
        let secret = self.secrets.get(secret_name).await?;
        let now = chrono::Utc::now().timestamp();
        let exp = now.checked_add(ttl_seconds).ok_or_else(|| {
            ConfigError::InvalidValue(format!("token lifetime of {}s is too large", ttl_seconds))
        })?;
        let outgoing = OutgoingClaims {
            claims,
            iat: now,
            exp,
            iss: &self.issuer,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &outgoing,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify signature, issuer and expiry, returning the claims
    ///
    /// # Errors
    /// `TokenExpired` for an expired token, `TokenInvalid` for anything else wrong with it
    pub async fn verify<T: DeserializeOwned>(
        &self,
        token: &str,
        secret_name: &str,
    ) -> Result<TokenPayload<T>, AppError> {
        let secret = self.secrets.get(secret_name).await?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);

        decode::<IncomingClaims<T>>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map(|data| TokenPayload {
            claims: data.claims.claims,
            issued_at: data.claims.iat,
            expires_at: data.claims.exp,
        })
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::Auth(AuthError::TokenExpired),
            _ => {
                tracing::debug!("JWT validation error: {}", e);
                AppError::Auth(AuthError::TokenInvalid)
            }
        })
    }

    /// Sign with the family's secret and configured lifetime
    pub async fn issue<T: Serialize>(
        &self,
        claims: &T,
        family: TokenFamily,
    ) -> Result<IssuedToken, AppError> {
        let ttl_seconds = self.secrets.get_seconds(family.ttl_name()).await?;
        let value = self.sign(claims, family.secret_name(), ttl_seconds).await?;
        Ok(IssuedToken { value, ttl_seconds })
    }

    pub async fn verify_family<T: DeserializeOwned>(
        &self,
        token: &str,
        family: TokenFamily,
    ) -> Result<TokenPayload<T>, AppError> {
        self.verify(token, family.secret_name()).await
    }
}
