//! Identity options: password policy and session lifetimes.

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
const DEFAULT_REMEMBER_ME_TTL_SECONDS: i64 = 14 * 24 * 60 * 60;
const DEFAULT_PASSWORD_MIN_LENGTH: usize = 6;
const DEFAULT_ALLOWED_USER_NAME_CHARACTERS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-._@+";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordOptions {
    pub required_length: usize,
    pub require_non_alphanumeric: bool,
    pub require_digit: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
}

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            required_length: DEFAULT_PASSWORD_MIN_LENGTH,
            require_non_alphanumeric: true,
            require_digit: true,
            require_lowercase: true,
            require_uppercase: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct IdentityOptions {
    password: PasswordOptions,
    allowed_user_name_characters: String,
    session_ttl_seconds: i64,
    remember_me_ttl_seconds: i64,
}

impl Default for IdentityOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            password: PasswordOptions::default(),
            allowed_user_name_characters: DEFAULT_ALLOWED_USER_NAME_CHARACTERS.to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            remember_me_ttl_seconds: DEFAULT_REMEMBER_ME_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_password_min_length(mut self, length: usize) -> Self {
        self.password.required_length = length;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_remember_me_ttl_seconds(mut self, seconds: i64) -> Self {
        self.remember_me_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn password(&self) -> &PasswordOptions {
        &self.password
    }

    #[must_use]
    pub fn allowed_user_name_characters(&self) -> &str {
        &self.allowed_user_name_characters
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn remember_me_ttl_seconds(&self) -> i64 {
        self.remember_me_ttl_seconds
    }

    /// Server-side lifetime for a session of the given kind.
    pub(super) fn ttl_for(&self, persistent: bool) -> i64 {
        if persistent {
            self.remember_me_ttl_seconds
        } else {
            self.session_ttl_seconds
        }
    }
}
