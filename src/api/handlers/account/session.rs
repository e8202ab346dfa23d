//! Session cookie handling and the authenticated-user guard.

use axum::{
    http::{
        HeaderMap, HeaderValue, StatusCode, Uri,
        header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
    },
    response::{IntoResponse, Redirect, Response},
};
use tracing::error;
use url::form_urlencoded;

use super::{LOGIN_PATH, internal_error, state::AuthState};
use crate::identity::{Session, User};

pub const SESSION_COOKIE_NAME: &str = "mynotes_session";

/// Build the `HttpOnly` session cookie.
///
/// Persistent sessions survive a browser restart (`Max-Age`); the others are
/// browser-session cookies and only expire server side.
pub(super) fn session_cookie(
    session: &Session,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax",
        session.token
    );
    if session.persistent {
        cookie.push_str(&format!("; Max-Age={}", session.ttl_seconds));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Redirect after a successful sign-in, carrying the session cookie.
pub(super) fn signed_in_redirect(session: &Session, secure: bool, target: &str) -> Response {
    let mut headers = HeaderMap::new();
    match session_cookie(session, secure) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            return internal_error("Failed to build session cookie", &anyhow::Error::new(err));
        }
    }
    (headers, Redirect::to(target)).into_response()
}

/// Read a cookie by name across every `Cookie` header.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
        .filter(|value| !value.is_empty())
}

pub(super) fn session_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE_NAME)
}

/// Revoke the session the request arrived with before a new one replaces its
/// cookie. Failures are logged; the new sign-in still proceeds.
pub(super) async fn end_previous_session(headers: &HeaderMap, auth_state: &AuthState) {
    let Some(token) = session_token(headers) else {
        return;
    };
    if let Err(err) = auth_state.identity().sign_out(&token).await {
        error!("Failed to delete previous session: {err:#}");
    }
}

/// Resolve the session cookie into a user, if present and live.
pub(crate) async fn current_user(
    headers: &HeaderMap,
    auth_state: &AuthState,
) -> Result<Option<User>, StatusCode> {
    let Some(token) = session_token(headers) else {
        return Ok(None);
    };
    auth_state.identity().authenticate(&token).await.map_err(|err| {
        error!("Failed to lookup session: {err:#}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Like [`current_user`], but anonymous requests are redirected to the login
/// page with a `returnUrl` pointing back at `uri`.
pub(crate) async fn require_user(
    headers: &HeaderMap,
    auth_state: &AuthState,
    uri: &Uri,
) -> Result<User, Response> {
    match current_user(headers, auth_state).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(Redirect::to(&login_redirect_target(uri)).into_response()),
        Err(status) => Err(status.into_response()),
    }
}

fn login_redirect_target(uri: &Uri) -> String {
    let return_url = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string);
    let encoded: String = form_urlencoded::byte_serialize(return_url.as_bytes()).collect();
    format!("{LOGIN_PATH}?returnUrl={encoded}")
}
