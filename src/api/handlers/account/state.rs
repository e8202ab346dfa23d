//! Shared state injected into the account handlers.

use std::sync::Arc;

use super::antiforgery::AntiforgeryKey;
use crate::identity::IdentityService;

pub struct AuthState {
    identity: Arc<dyn IdentityService>,
    cookie_secure: bool,
    antiforgery_key: AntiforgeryKey,
}

impl AuthState {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        Self {
            identity,
            cookie_secure: false,
            antiforgery_key: AntiforgeryKey::generate(),
        }
    }

    /// Mark cookies `Secure`; enable whenever the site is served over HTTPS.
    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    pub(crate) fn identity(&self) -> &dyn IdentityService {
        self.identity.as_ref()
    }

    pub(crate) fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    pub(crate) fn antiforgery_key(&self) -> &AntiforgeryKey {
        &self.antiforgery_key
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("cookie_secure", &self.cookie_secure)
            .finish_non_exhaustive()
    }
}
