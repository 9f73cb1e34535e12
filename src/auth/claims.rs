/// Token claim sets
///
/// The codec adds `iat`, `exp` and `iss` around these; they only carry
/// what each token family needs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};

/// Claims of access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Unique token id, so tokens minted in the same second differ
    pub jti: String,
}

impl SessionClaims {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// `TokenInvalid` if the subject is not a UUID
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::TokenInvalid))
    }
}

/// What an action link lets its holder do
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkPurpose {
    Reset,
    Confirm,
}

impl LinkPurpose {
    /// UI path the link points to
    pub fn path(self) -> &'static str {
        match self {
            LinkPurpose::Reset => "/auth/new-password",
            LinkPurpose::Confirm => "/auth/validate",
        }
    }

    pub fn subject(self) -> &'static str {
        match self {
            LinkPurpose::Reset => "Password reset",
            LinkPurpose::Confirm => "Email confirmation",
        }
    }

    pub fn intro(self) -> &'static str {
        match self {
            LinkPurpose::Reset => {
                "A password reset was requested. If this was you, click this link to proceed:"
            }
            LinkPurpose::Confirm => {
                "Welcome to the Texas Poker app. To confirm your email address, click here:"
            }
        }
    }
}

/// Claims of an action-link token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ActionLinkClaims {
    pub email: String,
    pub purpose: LinkPurpose,
}

/// A verified token: its claims plus the timestamps the codec checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPayload<T> {
    pub claims: T,
    /// Unix timestamp
    pub issued_at: i64,
    /// Unix timestamp
    pub expires_at: i64,
}
