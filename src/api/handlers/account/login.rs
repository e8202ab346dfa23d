use axum::{
    Form,
    extract::{Extension, Query},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{
    AuthState,
    antiforgery::{antiforgery_error_response, validate},
    forms::{LoginQuery, LoginViewModel, ModelState},
    internal_error,
    redirect::return_target,
    session::{end_previous_session, signed_in_redirect},
    views::{login_page, page_response},
};
use crate::identity::SignInResult;

/// Single message for every credential failure, so the form does not reveal
/// whether the account exists.
pub const INVALID_LOGIN_MESSAGE: &str = "Incorrect password or Login";

#[utoipa::path(
    get,
    path = "/Account/Login",
    params(LoginQuery),
    responses(
        (status = 200, description = "Empty login form", content_type = "text/html"),
    ),
    tag = "account"
)]
pub async fn login_form(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    Query(query): Query<LoginQuery>,
) -> impl IntoResponse {
    let model = LoginViewModel {
        return_url: query.return_url,
        ..LoginViewModel::default()
    };
    page_response(&headers, &auth_state, |token| {
        login_page(&model, &ModelState::default(), token)
    })
}

#[utoipa::path(
    post,
    path = "/Account/Login",
    request_body(content = LoginViewModel, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in, redirect to the local return URL or /Home/Index"),
        (status = 200, description = "Form redisplayed with validation errors or the generic login error", content_type = "text/html"),
        (status = 400, description = "Anti-forgery token missing or invalid"),
        (status = 500, description = "Identity store unavailable"),
    ),
    tag = "account"
)]
#[instrument(skip_all)]
pub async fn login(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    Form(model): Form<LoginViewModel>,
) -> Response {
    if let Err(err) = validate(
        &headers,
        model.request_verification_token.as_deref(),
        auth_state.antiforgery_key(),
    ) {
        return antiforgery_error_response(&err).into_response();
    }

    let mut state = model.validate();
    if !state.is_valid() {
        debug!("login form invalid");
        return redisplay(&headers, &auth_state, &model, &state);
    }

    match auth_state
        .identity()
        .password_sign_in(&model.email, &model.password, model.remember_me)
        .await
    {
        Ok(SignInResult::Succeeded(session)) => {
            info!(persistent = session.persistent, "user logged in");
            end_previous_session(&headers, &auth_state).await;
            let target = return_target(model.return_url.as_deref());
            signed_in_redirect(&session, auth_state.cookie_secure(), &target)
        }
        Ok(SignInResult::Failed) => {
            state.add_model_error(INVALID_LOGIN_MESSAGE);
            redisplay(&headers, &auth_state, &model, &state)
        }
        Err(err) => internal_error("Failed to sign in", &err),
    }
}

fn redisplay(
    headers: &HeaderMap,
    auth_state: &AuthState,
    model: &LoginViewModel,
    state: &ModelState,
) -> Response {
    let model = model.without_password();
    page_response(headers, auth_state, |token| login_page(&model, state, token))
}
