use axum::{
    Form,
    extract::Extension,
    http::{HeaderMap, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::{
    AuthState, HOME_PATH,
    antiforgery::{antiforgery_error_response, validate},
    forms::LogOffForm,
    session::{clear_session_cookie, session_token},
};

#[utoipa::path(
    post,
    path = "/Account/LogOff",
    request_body(content = LogOffForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Session ended, redirect to /Home/Index"),
        (status = 400, description = "Anti-forgery token missing or invalid"),
    ),
    tag = "account"
)]
#[instrument(skip_all)]
pub async fn logoff(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    Form(form): Form<LogOffForm>,
) -> Response {
    if let Err(err) = validate(
        &headers,
        form.request_verification_token.as_deref(),
        auth_state.antiforgery_key(),
    ) {
        return antiforgery_error_response(&err).into_response();
    }

    if let Some(token) = session_token(&headers) {
        match auth_state.identity().sign_out(&token).await {
            Ok(()) => info!("user logged off"),
            Err(err) => error!("Failed to delete session: {err:#}"),
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.cookie_secure()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (response_headers, Redirect::to(HOME_PATH)).into_response()
}
