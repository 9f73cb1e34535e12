/// Slow hashing for passwords and refresh tokens at rest
///
/// Handles bcrypt hashing, password strength validation, and moving the
/// expensive work off the async executor.

use bcrypt::{hash, verify};
use sha2::{Digest, Sha256};

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// Hash a password using bcrypt after checking its strength
///
/// # Errors
/// Returns error if:
/// - Password fails validation (too short, weak, etc.)
/// - Bcrypt hashing fails
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    validate_password_strength(password)?;
    hash_secret(password, cost)
}

/// Hash an arbitrary secret using bcrypt, without strength rules
pub fn hash_secret(secret: &str, cost: u32) -> Result<String, AppError> {
    hash(secret, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a secret against its bcrypt hash
///
/// # Errors
/// Returns error if the stored hash is malformed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

/// `hash_password` on the blocking thread pool
pub async fn hash_password_blocking(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost)).await?
}

/// `verify_password` on the blocking thread pool
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?
}

/// SHA-256 of a refresh token, hex encoded
///
/// bcrypt reads only the first 72 bytes of its input and JWTs for one user
/// share a longer prefix than that, so tokens are digested before hashing.
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Slow hash of a refresh token, as stored on the user record
pub async fn hash_refresh_token(token: &str, cost: u32) -> Result<String, AppError> {
    let fingerprint = token_fingerprint(token);
    tokio::task::spawn_blocking(move || hash_secret(&fingerprint, cost)).await?
}

/// Compare a presented refresh token with the stored slow hash
pub async fn verify_refresh_token(token: &str, stored_hash: &str) -> Result<bool, AppError> {
    verify_password_blocking(token_fingerprint(token), stored_hash.to_string()).await
}

/// Validate password strength requirements
///
/// Requirements:
/// - Minimum 8 characters
/// - Maximum 128 characters
/// - At least one digit
/// - At least one lowercase letter
/// - At least one uppercase letter
pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        )));
    }

    // bcrypt limitation and DoS prevention
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        )));
    }

    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(AppError::Validation(ValidationError::InvalidFormat(
            "password must contain at least one digit, one lowercase letter, and one uppercase letter"
                .to_string(),
        )));
    }

    Ok(())
}
