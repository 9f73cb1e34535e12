use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{NewUser, UserRecord, UserStore};
use crate::error::AppError;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, refresh_token_hash, active, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    refresh_token_hash: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            refresh_token_hash: row.refresh_token_hash,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL user store (see `migrations/`)
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<UserRecord>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE {} = $1",
            USER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRecord::from))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, active, created_at)
            VALUES ($1, $2, $3, $4, false, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AppError> {
        self.find_one("username", username).await
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRecord::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        self.find_one("email", email).await
    }

    async fn update_refresh_token_hash(
        &self,
        user_id: Uuid,
        hash: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET refresh_token_hash = $1 WHERE id = $2")
            .bind(hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn swap_refresh_token_hash(
        &self,
        user_id: Uuid,
        expected: &str,
        replacement: Option<&str>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $1
            WHERE id = $2 AND refresh_token_hash = $3
            "#,
        )
        .bind(replacement)
        .bind(user_id)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE email = $2")
            .bind(password_hash)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_active(&self, email: &str) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET active = true WHERE email = $1 AND active = false")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
