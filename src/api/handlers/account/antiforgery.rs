//! Anti-forgery tokens for the account forms (signed double-submit cookie).
//!
//! Rendering a form issues (or reuses) a token in an `HttpOnly`,
//! `SameSite=Strict` cookie and embeds the same value in a hidden field.
//! A token is `<nonce>.<mac>` where the MAC is HMAC-SHA256 of the nonce under
//! a key only this process knows. A protected `POST` must carry both copies,
//! they must match, and the MAC must verify.

use anyhow::{Context, Result};
use axum::http::{
    HeaderMap, HeaderValue, StatusCode,
    header::{InvalidHeaderValue, SET_COOKIE},
};
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

use super::session::cookie_value;

type HmacSha256 = Hmac<Sha256>;

pub const ANTIFORGERY_COOKIE_NAME: &str = "mynotes_antiforgery";
pub const ANTIFORGERY_FIELD: &str = "__RequestVerificationToken";

// 32 bytes, base64url without padding.
const PART_LEN: usize = 43;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AntiforgeryError {
    #[error("anti-forgery cookie is missing")]
    MissingCookie,
    #[error("anti-forgery form field is missing")]
    MissingField,
    #[error("anti-forgery token does not match")]
    Mismatch,
    #[error("anti-forgery token was not issued by this server")]
    Forged,
}

/// Secret used to sign anti-forgery tokens.
pub struct AntiforgeryKey([u8; 32]);

impl AntiforgeryKey {
    /// Fresh random key; tokens issued before a restart stop validating.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::random())
    }

    fn mac(&self, nonce: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.0)
            .map_err(|err| anyhow::anyhow!("invalid anti-forgery key: {err}"))?;
        mac.update(nonce);
        Ok(mac)
    }

    fn sign(&self, nonce: &[u8]) -> Result<String> {
        let tag = self.mac(nonce)?.finalize().into_bytes();
        let engine = &base64::engine::general_purpose::URL_SAFE_NO_PAD;
        Ok(format!("{}.{}", engine.encode(nonce), engine.encode(tag)))
    }

    /// `true` when `token` is well formed and carries a valid MAC.
    fn verify(&self, token: &str) -> bool {
        let Some((nonce, tag)) = token.split_once('.') else {
            return false;
        };
        if nonce.len() != PART_LEN || tag.len() != PART_LEN {
            return false;
        }
        let engine = &base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let (Ok(nonce), Ok(tag)) = (engine.decode(nonce), engine.decode(tag)) else {
            return false;
        };
        self.mac(&nonce)
            .is_ok_and(|mac| mac.verify_slice(&tag).is_ok())
    }
}

impl std::fmt::Debug for AntiforgeryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AntiforgeryKey(***)")
    }
}

/// Token to embed in a rendered form.
#[derive(Debug)]
pub struct AntiforgeryToken {
    value: String,
    /// `true` when the browser does not hold this token yet.
    issued: bool,
}

impl AntiforgeryToken {
    /// Reuse a valid token from the request cookie, or mint a new one.
    ///
    /// # Errors
    /// Returns an error if the system RNG fails.
    pub fn for_request(headers: &HeaderMap, key: &AntiforgeryKey) -> Result<Self> {
        if let Some(value) =
            cookie_value(headers, ANTIFORGERY_COOKIE_NAME).filter(|value| key.verify(value))
        {
            return Ok(Self {
                value,
                issued: false,
            });
        }

        let mut nonce = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut nonce)
            .context("failed to generate anti-forgery token")?;
        Ok(Self {
            value: key.sign(&nonce)?,
            issued: true,
        })
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Append the `Set-Cookie` header when the token is new.
    pub fn apply(&self, headers: &mut HeaderMap, secure: bool) {
        if !self.issued {
            return;
        }
        match antiforgery_cookie(&self.value, secure) {
            Ok(cookie) => {
                headers.append(SET_COOKIE, cookie);
            }
            Err(err) => warn!("Failed to build anti-forgery cookie: {err}"),
        }
    }
}

fn antiforgery_cookie(token: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{ANTIFORGERY_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Strict");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Check the posted field against the cookie and the cookie against `key`.
///
/// # Errors
/// Returns which part of the pair is missing, that they differ, or that the
/// token was not signed by `key`.
pub fn validate(
    headers: &HeaderMap,
    field: Option<&str>,
    key: &AntiforgeryKey,
) -> Result<(), AntiforgeryError> {
    let Some(cookie) = cookie_value(headers, ANTIFORGERY_COOKIE_NAME) else {
        return Err(AntiforgeryError::MissingCookie);
    };
    let Some(field) = field.map(str::trim).filter(|value| !value.is_empty()) else {
        return Err(AntiforgeryError::MissingField);
    };
    if cookie.as_bytes() != field.as_bytes() {
        return Err(AntiforgeryError::Mismatch);
    }
    if key.verify(&cookie) {
        Ok(())
    } else {
        Err(AntiforgeryError::Forged)
    }
}

pub fn antiforgery_error_response(err: &AntiforgeryError) -> (StatusCode, String) {
    warn!("Rejected request: {err}");
    (StatusCode::BAD_REQUEST, "Bad Request".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(cookie) = HeaderValue::from_str(&format!("{ANTIFORGERY_COOKIE_NAME}={value}")) {
            headers.insert(COOKIE, cookie);
        }
        headers
    }

    #[test]
    fn new_token_sets_cookie() -> Result<()> {
        let key = AntiforgeryKey::generate();
        let token = AntiforgeryToken::for_request(&HeaderMap::new(), &key)?;
        assert_eq!(token.value().len(), PART_LEN * 2 + 1);
        assert!(key.verify(token.value()));

        let mut headers = HeaderMap::new();
        token.apply(&mut headers, true);
        let cookie = headers
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(cookie.starts_with(&format!("{ANTIFORGERY_COOKIE_NAME}={}", token.value())));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.ends_with("; Secure"));
        Ok(())
    }

    #[test]
    fn existing_token_is_reused_without_cookie() -> Result<()> {
        let key = AntiforgeryKey::generate();
        let existing = AntiforgeryToken::for_request(&HeaderMap::new(), &key)?;
        let headers = headers_with_cookie(existing.value());
        let token = AntiforgeryToken::for_request(&headers, &key)?;
        assert_eq!(token.value(), existing.value());

        let mut response_headers = HeaderMap::new();
        token.apply(&mut response_headers, false);
        assert!(response_headers.get(SET_COOKIE).is_none());
        Ok(())
    }

    #[test]
    fn unsigned_cookie_is_replaced() -> Result<()> {
        let key = AntiforgeryKey::generate();
        let unsigned = format!("{0}.{0}", "A".repeat(PART_LEN));
        for planted in ["short", unsigned.as_str()] {
            let token = AntiforgeryToken::for_request(&headers_with_cookie(planted), &key)?;
            assert_ne!(token.value(), planted);
            assert!(key.verify(token.value()));
        }
        Ok(())
    }

    #[test]
    fn token_from_another_key_is_replaced() -> Result<()> {
        let other = AntiforgeryToken::for_request(&HeaderMap::new(), &AntiforgeryKey::generate())?;
        let key = AntiforgeryKey::generate();
        let token = AntiforgeryToken::for_request(&headers_with_cookie(other.value()), &key)?;
        assert_ne!(token.value(), other.value());
        Ok(())
    }

    #[test]
    fn validate_requires_matching_signed_pair() -> Result<()> {
        let key = AntiforgeryKey::generate();
        let issued = AntiforgeryToken::for_request(&HeaderMap::new(), &key)?;
        let headers = headers_with_cookie(issued.value());
        assert_eq!(validate(&headers, Some(issued.value()), &key), Ok(()));
        assert_eq!(
            validate(&headers, Some("abd"), &key),
            Err(AntiforgeryError::Mismatch)
        );
        assert_eq!(
            validate(&headers, None, &key),
            Err(AntiforgeryError::MissingField)
        );
        assert_eq!(
            validate(&HeaderMap::new(), Some(issued.value()), &key),
            Err(AntiforgeryError::MissingCookie)
        );
        Ok(())
    }

    #[test]
    fn validate_rejects_pair_the_server_never_issued() -> Result<()> {
        let key = AntiforgeryKey::generate();
        assert_eq!(
            validate(&headers_with_cookie("x"), Some("x"), &key),
            Err(AntiforgeryError::Forged)
        );

        let foreign = AntiforgeryToken::for_request(&HeaderMap::new(), &AntiforgeryKey::generate())?;
        assert_eq!(
            validate(
                &headers_with_cookie(foreign.value()),
                Some(foreign.value()),
                &key
            ),
            Err(AntiforgeryError::Forged)
        );

        // Flipping the MAC invalidates an otherwise genuine token.
        let issued = AntiforgeryToken::for_request(&HeaderMap::new(), &key)?;
        let (nonce, _) = issued.value().split_once('.').context("missing separator")?;
        let tampered = format!("{nonce}.{}", "A".repeat(PART_LEN));
        assert_eq!(
            validate(&headers_with_cookie(&tampered), Some(&tampered), &key),
            Err(AntiforgeryError::Forged)
        );
        Ok(())
    }

    #[test]
    fn error_response_is_bad_request() {
        let (status, _) = antiforgery_error_response(&AntiforgeryError::Forged);
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
