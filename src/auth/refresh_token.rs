/// Refresh Rotation Guard
///
/// Exchanges a refresh token for a new access/refresh pair. The presented token
/// must verify under the refresh secret and match the slow hash stored on the
/// user. The new hash replaces the old one through a compare-and-set, so of
/// several concurrent refreshes with the same token only one can win.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::claims::SessionClaims;
use crate::auth::cookies::SessionCookieSet;
use crate::auth::jwt::{TokenCodec, TokenFamily};
use crate::auth::password::verify_refresh_token;
use crate::auth::session::SessionIssuer;
use crate::error::{AppError, AuthError};
use crate::store::{UserRecord, UserStore};

pub struct RefreshRotationGuard {
    store: Arc<dyn UserStore>,
    codec: Arc<TokenCodec>,
    sessions: Arc<SessionIssuer>,
    revoke_on_reuse: bool,
}

fn unauthorized() -> AppError {
    AppError::Auth(AuthError::Unauthorized)
}

impl RefreshRotationGuard {
    pub fn new(
        store: Arc<dyn UserStore>,
        codec: Arc<TokenCodec>,
        sessions: Arc<SessionIssuer>,
        revoke_on_reuse: bool,
    ) -> Self {
        Self {
            store,
            codec,
            sessions,
            revoke_on_reuse,
        }
    }

    /// Rotate `presented`, which must belong to `claimed_user_id`
    ///
    /// # Errors
    /// `Unauthorized` for any token that cannot be rotated; the client has to log in again
    pub async fn refresh(
        &self,
        presented: &str,
        claimed_user_id: Uuid,
    ) -> Result<(UserRecord, SessionCookieSet), AppError> {
        let subject = self.verified_subject(presented).await?;
        if subject != claimed_user_id {
            tracing::warn!(user_id = %claimed_user_id, "Refresh token belongs to another user");
            return Err(unauthorized());
        }
        self.rotate(presented, subject).await
    }

    /// Rotate `presented` for whichever user it was issued to
    pub async fn refresh_presented(
        &self,
        presented: &str,
    ) -> Result<(UserRecord, SessionCookieSet), AppError> {
        let subject = self.verified_subject(presented).await?;
        self.rotate(presented, subject).await
    }

    async fn verified_subject(&self, presented: &str) -> Result<Uuid, AppError> {
        let payload = match self
            .codec
            .verify_family::<SessionClaims>(presented, TokenFamily::Refresh)
            .await
        {
            Ok(payload) => payload,
            Err(AppError::Auth(e)) => {
                tracing::info!(error = %e, "Refresh token failed verification");
                return Err(unauthorized());
            }
            Err(e) => return Err(e),
        };
        payload.claims.user_id().map_err(|_| unauthorized())
    }

    async fn rotate(
        &self,
        presented: &str,
        user_id: Uuid,
    ) -> Result<(UserRecord, SessionCookieSet), AppError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(unauthorized)?;

        let stored_hash = match &user.refresh_token_hash {
            Some(hash) => hash.clone(),
            None => {
                tracing::info!(user_id = %user.id, "Refresh without an active session");
                return Err(unauthorized());
            }
        };

        if !verify_refresh_token(presented, &stored_hash).await? {
            tracing::warn!(user_id = %user.id, "refresh token reuse detected");
            if self.revoke_on_reuse {
                // only the session the stale token was checked against
                let revoked = self
                    .store
                    .swap_refresh_token_hash(user.id, &stored_hash, None)
                    .await?;
                if revoked {
                    tracing::warn!(user_id = %user.id, "Session revoked after refresh token reuse");
                } else {
                    tracing::info!(user_id = %user.id, "Session changed before it could be revoked");
                }
            }
            return Err(unauthorized());
        }

        let minted = self.sessions.mint(user.id).await?;
        let swapped = self
            .store
            .swap_refresh_token_hash(user.id, &stored_hash, Some(&minted.refresh_hash))
            .await?;
        if !swapped {
            tracing::warn!(user_id = %user.id, "Lost refresh rotation race");
            return Err(unauthorized());
        }

        tracing::info!(user_id = %user.id, "Refresh token rotated");
        let cookies = self
            .sessions
            .cookie_manager()
            .build_session_cookies(&minted.access, &minted.refresh);
        Ok((user, cookies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::cookies::REFRESH_COOKIE;
    use crate::auth::testing;
    use crate::store::{InMemoryUserStore, NewUser};
    use async_trait::async_trait;

    fn refresh_value(cookies: &SessionCookieSet) -> String {
        cookies.get(REFRESH_COOKIE).unwrap().value().to_string()
    }

    fn guard(store: Arc<InMemoryUserStore>, revoke_on_reuse: bool) -> (Arc<SessionIssuer>, RefreshRotationGuard) {
        let sessions = testing::session_issuer(store.clone());
        let guard = RefreshRotationGuard::new(store, testing::codec(), sessions.clone(), revoke_on_reuse);
        (sessions, guard)
    }

    #[tokio::test]
    async fn test_rotation_rejects_previous_token() {
        let (store, alice) = testing::store_with_alice().await;
        let (sessions, guard) = guard(store, false);

        let (_, login) = sessions.login("alice", "Secret#1").await.unwrap();
        let first = refresh_value(&login);

        let (_, rotated) = guard.refresh(&first, alice.id).await.unwrap();
        let second = refresh_value(&rotated);
        assert_ne!(first, second);

        let err = guard.refresh(&first, alice.id).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::Unauthorized));

        assert!(guard.refresh(&second, alice.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_one_winner() {
        let (store, alice) = testing::store_with_alice().await;
        let (sessions, guard) = guard(store, false);

        let (_, login) = sessions.login("alice", "Secret#1").await.unwrap();
        let token = refresh_value(&login);

        let (a, b) = tokio::join!(guard.refresh(&token, alice.id), guard.refresh(&token, alice.id));
        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);

        let loser = if a.is_err() { a } else { b };
        assert_eq!(loser.unwrap_err().auth_kind(), Some(AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn test_refresh_after_logout_fails() {
        let (store, alice) = testing::store_with_alice().await;
        let (sessions, guard) = guard(store, false);

        let (_, login) = sessions.login("alice", "Secret#1").await.unwrap();
        sessions.logout(alice.id).await.unwrap();

        let err = guard.refresh(&refresh_value(&login), alice.id).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn test_access_token_cannot_refresh() {
        let (store, alice) = testing::store_with_alice().await;
        let (sessions, guard) = guard(store, false);

        let (_, login) = sessions.login("alice", "Secret#1").await.unwrap();
        let access = login
            .get(crate::auth::cookies::ACCESS_COOKIE)
            .unwrap()
            .value()
            .to_string();

        let err = guard.refresh(&access, alice.id).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn test_claimed_user_must_match_subject() {
        let (store, _) = testing::store_with_alice().await;
        let (sessions, guard) = guard(store, false);

        let (_, login) = sessions.login("alice", "Secret#1").await.unwrap();
        let err = guard
            .refresh(&refresh_value(&login), Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn test_refresh_presented_finds_user_from_token() {
        let (store, alice) = testing::store_with_alice().await;
        let (sessions, guard) = guard(store, false);

        let (_, login) = sessions.login("alice", "Secret#1").await.unwrap();
        let (user, _) = guard.refresh_presented(&refresh_value(&login)).await.unwrap();
        assert_eq!(user.id, alice.id);
    }

    #[tokio::test]
    async fn test_reuse_revokes_session_when_configured() {
        let (store, alice) = testing::store_with_alice().await;
        let (sessions, guard) = guard(store.clone(), true);

        let (_, login) = sessions.login("alice", "Secret#1").await.unwrap();
        let stale = refresh_value(&login);
        let (_, rotated) = guard.refresh(&stale, alice.id).await.unwrap();

        assert!(guard.refresh(&stale, alice.id).await.is_err());

        let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
        assert!(stored.refresh_token_hash.is_none());
        assert!(guard.refresh(&refresh_value(&rotated), alice.id).await.is_err());
    }

    /// Writes a new session hash right after every `find_by_id`, as a login
    /// on another device would between the read and the write of a refresh.
    struct LoginAfterReadStore {
        inner: Arc<InMemoryUserStore>,
        fresh_hash: String,
    }

    #[async_trait]
    impl UserStore for LoginAfterReadStore {
        async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, AppError> {
            self.inner.create_user(new_user).await
        }

        async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AppError> {
            self.inner.find_by_username(username).await
        }

        async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, AppError> {
            let found = self.inner.find_by_id(user_id).await?;
            self.inner
                .update_refresh_token_hash(user_id, Some(&self.fresh_hash))
                .await?;
            Ok(found)
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
            self.inner.find_by_email(email).await
        }

        async fn update_refresh_token_hash(
            &self,
            user_id: Uuid,
            hash: Option<&str>,
        ) -> Result<(), AppError> {
            self.inner.update_refresh_token_hash(user_id, hash).await
        }

        async fn swap_refresh_token_hash(
            &self,
            user_id: Uuid,
            expected: &str,
            replacement: Option<&str>,
        ) -> Result<bool, AppError> {
            self.inner
                .swap_refresh_token_hash(user_id, expected, replacement)
                .await
        }

        async fn update_password(&self, email: &str, password_hash: &str) -> Result<bool, AppError> {
            self.inner.update_password(email, password_hash).await
        }

        async fn set_active(&self, email: &str) -> Result<bool, AppError> {
            self.inner.set_active(email).await
        }
    }

    #[tokio::test]
    async fn test_reuse_revocation_spares_a_newer_session() {
        let (store, alice) = testing::store_with_alice().await;
        let (sessions, plain) = guard(store.clone(), false);

        let (_, login) = sessions.login("alice", "Secret#1").await.unwrap();
        let stale = refresh_value(&login);
        plain.refresh(&stale, alice.id).await.unwrap();

        let racing = RefreshRotationGuard::new(
            Arc::new(LoginAfterReadStore {
                inner: store.clone(),
                fresh_hash: "fresh-login-hash".to_string(),
            }),
            testing::codec(),
            sessions,
            true,
        );
        let err = racing.refresh(&stale, alice.id).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::Unauthorized));

        let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash.as_deref(), Some("fresh-login-hash"));
    }
}
