use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{NewUser, UserRecord, UserStore};
use crate::error::{AppError, DatabaseError};

/// In-process user store for tests and local development.
///
/// Every operation runs under one lock, so compare-and-set is atomic.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<Uuid, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, UserRecord>>, AppError> {
        self.users
            .lock()
            .map_err(|_| AppError::Database(DatabaseError::UnexpectedError("user store lock poisoned".to_string())))
    }
}

fn find_by<F>(users: &HashMap<Uuid, UserRecord>, pred: F) -> Option<UserRecord>
where
    F: Fn(&UserRecord) -> bool,
{
    users.values().find(|u| pred(u)).cloned()
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, AppError> {
        let mut users = self.lock()?;
        if users.values().any(|u| u.username == new_user.username) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "Username already exists".to_string(),
            )
            .into());
        }
        if users.values().any(|u| u.email == new_user.email) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "Email already exists".to_string(),
            )
            .into());
        }

        let user = UserRecord {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            refresh_token_hash: None,
            active: false,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(find_by(&*self.lock()?, |u| u.username == username))
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, AppError> {
        Ok(self.lock()?.get(&user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(find_by(&*self.lock()?, |u| u.email == email))
    }

    async fn update_refresh_token_hash(
        &self,
        user_id: Uuid,
        hash: Option<&str>,
    ) -> Result<(), AppError> {
        if let Some(user) = self.lock()?.get_mut(&user_id) {
            user.refresh_token_hash = hash.map(str::to_string);
        }
        Ok(())
    }

    async fn swap_refresh_token_hash(
        &self,
        user_id: Uuid,
        expected: &str,
        replacement: Option<&str>,
    ) -> Result<bool, AppError> {
        let mut users = self.lock()?;
        match users.get_mut(&user_id) {
            Some(user) if user.refresh_token_hash.as_deref() == Some(expected) => {
                user.refresh_token_hash = replacement.map(str::to_string);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<bool, AppError> {
        let mut users = self.lock()?;
        match users.values_mut().find(|u| u.email == email) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_active(&self, email: &str) -> Result<bool, AppError> {
        let mut users = self.lock()?;
        match users.values_mut().find(|u| u.email == email) {
            Some(user) if !user.active => {
                user.active = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
