//! Password policy and Argon2id hashing.

use anyhow::{Context, Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use tokio::task;

use super::{IdentityError, PasswordOptions};

/// Check a password against the policy, returning every violated rule.
pub(super) fn validate_password(password: &str, options: &PasswordOptions) -> Vec<IdentityError> {
    let mut errors = Vec::new();

    if password.chars().count() < options.required_length {
        errors.push(IdentityError::password_too_short(options.required_length));
    }
    if options.require_non_alphanumeric && password.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push(IdentityError::password_requires_non_alphanumeric());
    }
    if options.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(IdentityError::password_requires_digit());
    }
    if options.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push(IdentityError::password_requires_lower());
    }
    if options.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push(IdentityError::password_requires_upper());
    }

    errors
}

/// Hash a password into a PHC string. Runs on the blocking pool.
pub(super) async fn hash_password(password: String) -> Result<String> {
    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| anyhow!("failed to hash password: {err}"))
    })
    .await
    .context("password hashing task failed")?
}

/// Verify a password against a stored PHC string. Runs on the blocking pool.
///
/// A malformed stored hash is an error, a mismatch is `Ok(false)`.
pub(super) async fn verify_password(password: String, password_hash: String) -> Result<bool> {
    task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&password_hash)
            .map_err(|err| anyhow!("invalid stored password hash: {err}"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .context("password verification task failed")?
}
