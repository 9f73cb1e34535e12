/// Credential Validator
///
/// Looks a user up by username and compares the password against the stored
/// bcrypt hash. An unknown username still pays for one bcrypt comparison
/// (against a hash computed at construction) so both failure paths take the
/// same time.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::auth::password::{hash_secret, verify_password_blocking};
use crate::error::AppError;
use crate::store::{UserRecord, UserStore};

pub struct CredentialValidator {
    store: Arc<dyn UserStore>,
    dummy_hash: String,
}

impl CredentialValidator {
    /// `cost` should match the cost passwords are stored with
    pub fn new(store: Arc<dyn UserStore>, cost: u32) -> Result<Self, AppError> {
        let filler: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let dummy_hash = hash_secret(&filler, cost)?;
        Ok(Self { store, dummy_hash })
    }

    /// `Ok(None)` for an unknown user or a wrong password; errors are infrastructure only
    pub async fn validate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, AppError> {
        let user = self.store.find_by_username(username).await?;

        let stored_hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.dummy_hash.clone(),
        };
        let matches = verify_password_blocking(password.to_string(), stored_hash).await?;

        match user {
            Some(user) if matches => Ok(Some(user)),
            Some(user) => {
                tracing::info!(user_id = %user.id, "Password mismatch");
                Ok(None)
            }
            None => {
                tracing::info!("Login attempt for unknown username");
                Ok(None)
            }
        }
    }
}
