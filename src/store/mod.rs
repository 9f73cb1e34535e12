/// User Store
///
/// The persistence collaborator the auth core talks to. Only the fields and
/// operations authentication needs are modelled here.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

mod memory;
mod postgres;

pub use memory::InMemoryUserStore;
pub use postgres::PgUserStore;

#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    /// Slow hash of the only refresh token currently valid for this user
    pub refresh_token_hash: Option<String>,
    /// Set once the email address has been confirmed
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// Hashes stay out of logs.
impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("has_refresh_token", &self.refresh_token_hash.is_some())
            .field("active", &self.active)
            .finish()
    }
}

/// A user about to be inserted; `password_hash` is already hashed
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Public view of a user, safe to return over HTTP
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub active: bool,
    pub created_at: String,
}

impl From<&UserRecord> for UserResponse {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            active: user.active,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new inactive user without a refresh token
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AppError>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;

    /// Unconditionally overwrite (or clear) the stored refresh-token hash
    async fn update_refresh_token_hash(
        &self,
        user_id: Uuid,
        hash: Option<&str>,
    ) -> Result<(), AppError>;

    /// Replace the stored refresh-token hash only if it still equals `expected`.
    ///
    /// Returns `true` when the swap happened. This is the single atomic
    /// read-modify-write that rotation relies on.
    async fn swap_refresh_token_hash(
        &self,
        user_id: Uuid,
        expected: &str,
        replacement: Option<&str>,
    ) -> Result<bool, AppError>;

    /// Returns `false` when no user has this email
    async fn update_password(&self, email: &str, password_hash: &str) -> Result<bool, AppError>;

    /// Mark the account active. Returns `false` if it was already active or absent.
    async fn set_active(&self, email: &str) -> Result<bool, AppError>;
}
