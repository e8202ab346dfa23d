//! [`IdentityService`] implementation over a [`UserStore`].

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    IdentityError, IdentityOptions, IdentityResult, IdentityService, NewUser, Session,
    SignInResult, User,
    password::{hash_password, validate_password, verify_password},
    store::{InsertOutcome, NewSession, UserStore},
    utils::{generate_security_stamp, generate_session_token, hash_session_token, normalize},
};

const SESSION_INSERT_ATTEMPTS: usize = 3;

pub struct IdentityManager {
    store: Arc<dyn UserStore>,
    options: IdentityOptions,
    /// Hash verified against when the user does not exist, so unknown
    /// accounts cost the same as wrong passwords.
    fallback_hash: String,
}

impl std::fmt::Debug for IdentityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityManager")
            .field("options", &self.options)
            .field("fallback_hash", &"***")
            .finish_non_exhaustive()
    }
}

impl IdentityManager {
    /// Build a manager over `store`.
    ///
    /// # Errors
    /// Returns an error if the fallback password hash cannot be computed.
    pub async fn new(store: Arc<dyn UserStore>, options: IdentityOptions) -> Result<Self> {
        let fallback_hash = hash_password(generate_session_token()?).await?;
        Ok(Self {
            store,
            options,
            fallback_hash,
        })
    }

    #[must_use]
    pub fn options(&self) -> &IdentityOptions {
        &self.options
    }

    fn valid_user_name(&self, user_name: &str) -> bool {
        let allowed = self.options.allowed_user_name_characters();
        !user_name.is_empty() && user_name.chars().all(|c| allowed.contains(c))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl IdentityService for IdentityManager {
    #[instrument(skip(self, password), fields(user_name = %user.user_name))]
    async fn create_user(&self, user: NewUser, password: &str) -> Result<IdentityResult> {
        let user_name = user.user_name.trim().to_string();
        let normalized_user_name = normalize(&user_name);
        let mut errors = Vec::new();

        if !self.valid_user_name(&user_name) {
            errors.push(IdentityError::invalid_user_name(&user_name));
        } else if self
            .store
            .find_by_user_name(&normalized_user_name)
            .await?
            .is_some()
        {
            errors.push(IdentityError::duplicate_user_name(&user_name));
        }

        errors.extend(validate_password(password, self.options.password()));

        if !errors.is_empty() {
            info!(errors = errors.len(), "user creation rejected");
            return Ok(IdentityResult::Failed(errors));
        }

        let email = user.email.trim().to_string();
        let record = User {
            id: Uuid::new_v4(),
            normalized_email: normalize(&email),
            email,
            normalized_user_name,
            user_name: user_name.clone(),
            password_hash: hash_password(password.to_string()).await?,
            security_stamp: generate_security_stamp()?,
            name: non_empty(user.name),
            login: non_empty(user.login),
        };

        match self.store.insert_user(&record).await? {
            InsertOutcome::Created => {
                info!(user_id = %record.id, "user created");
                Ok(IdentityResult::Succeeded(record))
            }
            // Lost a race against a concurrent registration with the same name.
            InsertOutcome::Conflict => Ok(IdentityResult::Failed(vec![
                IdentityError::duplicate_user_name(&user_name),
            ])),
        }
    }

    #[instrument(skip(self, password))]
    async fn password_sign_in(
        &self,
        user_name: &str,
        password: &str,
        persistent: bool,
    ) -> Result<SignInResult> {
        let normalized_user_name = normalize(user_name);
        let Some(user) = self.store.find_by_user_name(&normalized_user_name).await? else {
            verify_password(password.to_string(), self.fallback_hash.clone()).await?;
            debug!("sign-in failed: unknown user");
            return Ok(SignInResult::Failed);
        };

        if !verify_password(password.to_string(), user.password_hash.clone()).await? {
            debug!(user_id = %user.id, "sign-in failed: wrong password");
            return Ok(SignInResult::Failed);
        }

        let session = self.sign_in(&user, persistent).await?;
        Ok(SignInResult::Succeeded(session))
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn sign_in(&self, user: &User, persistent: bool) -> Result<Session> {
        let ttl_seconds = self.options.ttl_for(persistent);

        // Expired rows are only filtered on lookup; prune them as new ones arrive.
        match self.store.delete_expired_sessions().await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "expired sessions deleted"),
            Err(err) => warn!("Failed to delete expired sessions: {err:#}"),
        }

        for _ in 0..SESSION_INSERT_ATTEMPTS {
            let token = generate_session_token()?;
            let session = NewSession {
                session_hash: hash_session_token(&token),
                user_id: user.id,
                persistent,
                ttl_seconds,
            };
            match self.store.insert_session(&session).await? {
                InsertOutcome::Created => {
                    debug!("session opened");
                    return Ok(Session {
                        token,
                        persistent,
                        ttl_seconds,
                    });
                }
                InsertOutcome::Conflict => warn!("session token collision, retrying"),
            }
        }

        Err(anyhow!("failed to open session after {SESSION_INSERT_ATTEMPTS} attempts"))
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, session_token: &str) -> Result<()> {
        if session_token.is_empty() {
            return Ok(());
        }
        self.store
            .delete_session(&hash_session_token(session_token))
            .await
    }

    #[instrument(skip_all)]
    async fn authenticate(&self, session_token: &str) -> Result<Option<User>> {
        if session_token.is_empty() {
            return Ok(None);
        }
        self.store
            .lookup_session(&hash_session_token(session_token))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::memory::MemoryUserStore;

    async fn manager() -> Result<(Arc<MemoryUserStore>, IdentityManager)> {
        let store = Arc::new(MemoryUserStore::new());
        let manager = IdentityManager::new(store.clone(), IdentityOptions::new()).await?;
        Ok((store, manager))
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            user_name: email.to_string(),
            email: email.to_string(),
            ..NewUser::default()
        }
    }

    #[tokio::test]
    async fn create_user_hashes_and_normalizes() -> Result<()> {
        let (store, manager) = manager().await?;
        let result = manager
            .create_user(
                NewUser {
                    name: Some(" Alice ".to_string()),
                    ..new_user("Alice@Example.com")
                },
                "Str0ng!Pass",
            )
            .await?;

        let IdentityResult::Succeeded(user) = result else {
            return Err(anyhow!("expected success"));
        };
        assert_eq!(user.normalized_user_name, "alice@example.com");
        assert_eq!(user.normalized_email, "alice@example.com");
        assert_eq!(user.name.as_deref(), Some("Alice"));
        assert_eq!(user.login, None);
        assert_ne!(user.password_hash, "Str0ng!Pass");
        assert_eq!(store.user_count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn create_user_rejects_duplicates_case_insensitively() -> Result<()> {
        let (store, manager) = manager().await?;
        manager
            .create_user(new_user("a@example.com"), "Str0ng!Pass")
            .await?;
        let result = manager
            .create_user(new_user("A@EXAMPLE.com"), "Str0ng!Pass")
            .await?;

        let IdentityResult::Failed(errors) = result else {
            return Err(anyhow!("expected failure"));
        };
        assert_eq!(
            errors,
            vec![IdentityError::duplicate_user_name("A@EXAMPLE.com")]
        );
        assert_eq!(store.user_count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn create_user_collects_name_and_password_errors() -> Result<()> {
        let (store, manager) = manager().await?;
        let result = manager
            .create_user(new_user("bad name@example.com"), "short")
            .await?;

        let IdentityResult::Failed(errors) = result else {
            return Err(anyhow!("expected failure"));
        };
        let codes: Vec<&str> = errors.iter().map(|e| e.code).collect();
        assert_eq!(
            codes,
            vec![
                "InvalidUserName",
                "PasswordTooShort",
                "PasswordRequiresNonAlphanumeric",
                "PasswordRequiresDigit",
                "PasswordRequiresUpper",
            ]
        );
        assert_eq!(store.user_count().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn password_sign_in_opens_session() -> Result<()> {
        let (store, manager) = manager().await?;
        manager
            .create_user(new_user("a@example.com"), "Str0ng!Pass")
            .await?;

        let result = manager
            .password_sign_in("A@example.com", "Str0ng!Pass", true)
            .await?;
        let SignInResult::Succeeded(session) = result else {
            return Err(anyhow!("expected sign-in success"));
        };
        assert!(session.persistent);
        assert_eq!(session.ttl_seconds, manager.options().remember_me_ttl_seconds());
        assert_eq!(store.session_count().await, 1);

        let user = manager.authenticate(&session.token).await?;
        assert_eq!(user.map(|u| u.email), Some("a@example.com".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn password_sign_in_fails_for_wrong_password_and_unknown_user() -> Result<()> {
        let (store, manager) = manager().await?;
        manager
            .create_user(new_user("a@example.com"), "Str0ng!Pass")
            .await?;

        let wrong = manager
            .password_sign_in("a@example.com", "Wr0ng!Pass", false)
            .await?;
        let unknown = manager
            .password_sign_in("nobody@example.com", "Str0ng!Pass", false)
            .await?;
        assert!(matches!(wrong, SignInResult::Failed));
        assert!(matches!(unknown, SignInResult::Failed));
        assert_eq!(store.session_count().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn sign_out_invalidates_session() -> Result<()> {
        let (store, manager) = manager().await?;
        let IdentityResult::Succeeded(user) = manager
            .create_user(new_user("a@example.com"), "Str0ng!Pass")
            .await?
        else {
            return Err(anyhow!("expected success"));
        };

        let session = manager.sign_in(&user, false).await?;
        assert!(!session.persistent);
        assert!(manager.authenticate(&session.token).await?.is_some());

        manager.sign_out(&session.token).await?;
        assert!(manager.authenticate(&session.token).await?.is_none());
        assert_eq!(store.session_count().await, 0);

        // Signing out twice is harmless.
        manager.sign_out(&session.token).await?;
        Ok(())
    }

    #[tokio::test]
    async fn sign_in_deletes_expired_sessions() -> Result<()> {
        let (store, manager) = manager().await?;
        let IdentityResult::Succeeded(user) = manager
            .create_user(new_user("a@example.com"), "Str0ng!Pass")
            .await?
        else {
            return Err(anyhow!("expected success"));
        };

        for hash in [b"stale-1".to_vec(), b"stale-2".to_vec()] {
            store
                .insert_session(&NewSession {
                    session_hash: hash,
                    user_id: user.id,
                    persistent: false,
                    ttl_seconds: 0,
                })
                .await?;
        }
        assert_eq!(store.session_count().await, 2);

        let session = manager.sign_in(&user, false).await?;
        assert_eq!(store.session_count().await, 1);
        assert!(manager.authenticate(&session.token).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn authenticate_ignores_empty_and_unknown_tokens() -> Result<()> {
        let (_store, manager) = manager().await?;
        assert!(manager.authenticate("").await?.is_none());
        assert!(manager.authenticate("not-a-session").await?.is_none());
        Ok(())
    }
}
