//! Identity service: user creation, password sign-in and cookie sessions.
//!
//! Handlers never touch credentials directly. They call the [`IdentityService`]
//! capability set and branch on its outcome:
//!
//! - **`create_user`** validates the username and password policy, rejects
//!   duplicates, hashes the password with Argon2id and persists the record.
//! - **`password_sign_in`** verifies credentials and opens a session. Unknown
//!   users and wrong passwords produce the same [`SignInResult::Failed`].
//! - **`sign_in`** opens a session for an already verified user (right after
//!   registration).
//! - **`sign_out`** deletes the session behind a cookie token.
//! - **`authenticate`** resolves a cookie token back into a [`User`].
//!
//! ## Sessions
//!
//! A session token is 32 random bytes, base64url encoded. Only its SHA-256 hash
//! is stored, so a leaked `user_sessions` table cannot be replayed as cookies.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

mod manager;
#[cfg(test)]
pub(crate) mod memory;
mod options;
mod password;
pub mod store;
mod utils;

pub use manager::IdentityManager;
pub use options::{IdentityOptions, PasswordOptions};
pub use store::{PgUserStore, UserStore};

/// Persisted account record.
///
/// `password_hash` is an Argon2id PHC string owned by the identity service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub user_name: String,
    pub normalized_user_name: String,
    pub email: String,
    pub normalized_email: String,
    pub password_hash: String,
    pub security_stamp: String,
    /// Display name.
    pub name: Option<String>,
    /// Login alias.
    pub login: Option<String>,
}

/// Fields supplied by the caller when creating an account.
#[derive(Clone, Debug, Default)]
pub struct NewUser {
    pub user_name: String,
    pub email: String,
    pub name: Option<String>,
    pub login: Option<String>,
}

/// A single, human readable reason why an identity operation was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityError {
    pub code: &'static str,
    pub description: String,
}

impl IdentityError {
    pub(crate) fn password_too_short(length: usize) -> Self {
        Self {
            code: "PasswordTooShort",
            description: format!("Passwords must be at least {length} characters."),
        }
    }

    pub(crate) fn password_requires_non_alphanumeric() -> Self {
        Self {
            code: "PasswordRequiresNonAlphanumeric",
            description: "Passwords must have at least one non alphanumeric character."
                .to_string(),
        }
    }

    pub(crate) fn password_requires_digit() -> Self {
        Self {
            code: "PasswordRequiresDigit",
            description: "Passwords must have at least one digit ('0'-'9').".to_string(),
        }
    }

    pub(crate) fn password_requires_lower() -> Self {
        Self {
            code: "PasswordRequiresLower",
            description: "Passwords must have at least one lowercase ('a'-'z').".to_string(),
        }
    }

    pub(crate) fn password_requires_upper() -> Self {
        Self {
            code: "PasswordRequiresUpper",
            description: "Passwords must have at least one uppercase ('A'-'Z').".to_string(),
        }
    }

    pub(crate) fn invalid_user_name(user_name: &str) -> Self {
        Self {
            code: "InvalidUserName",
            description: format!(
                "Username '{user_name}' is invalid, can only contain letters or digits."
            ),
        }
    }

    pub(crate) fn duplicate_user_name(user_name: &str) -> Self {
        Self {
            code: "DuplicateUserName",
            description: format!("Username '{user_name}' is already taken."),
        }
    }
}

/// Outcome of [`IdentityService::create_user`].
#[derive(Debug)]
pub enum IdentityResult {
    Succeeded(User),
    Failed(Vec<IdentityError>),
}

/// A freshly opened session. `token` is the raw cookie value.
#[derive(Clone, Debug)]
pub struct Session {
    pub token: String,
    pub persistent: bool,
    pub ttl_seconds: i64,
}

/// Outcome of [`IdentityService::password_sign_in`].
#[derive(Debug)]
pub enum SignInResult {
    Succeeded(Session),
    Failed,
}

/// Capability set the account handlers depend on.
///
/// `Err` is reserved for infrastructure failures (database, hashing); business
/// rejections are part of the `Ok` value.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Validate, hash and persist a new account.
    async fn create_user(&self, user: NewUser, password: &str) -> Result<IdentityResult>;

    /// Verify credentials and, on success, open a session.
    async fn password_sign_in(
        &self,
        user_name: &str,
        password: &str,
        persistent: bool,
    ) -> Result<SignInResult>;

    /// Open a session for a user whose identity is already established.
    async fn sign_in(&self, user: &User, persistent: bool) -> Result<Session>;

    /// Drop the session behind `session_token`. Unknown tokens are ignored.
    async fn sign_out(&self, session_token: &str) -> Result<()>;

    /// Resolve a cookie token into its user, `None` when missing or expired.
    async fn authenticate(&self, session_token: &str) -> Result<Option<User>>;
}
