use axum::{
    Form,
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{
    AuthState, HOME_PATH,
    forms::{ModelState, RegisterViewModel},
    internal_error,
    session::{end_previous_session, signed_in_redirect},
    views::{page_response, register_page},
};
use crate::identity::{IdentityResult, NewUser};

#[utoipa::path(
    get,
    path = "/Account/Register",
    responses(
        (status = 200, description = "Empty registration form", content_type = "text/html"),
    ),
    tag = "account"
)]
pub async fn register_form(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    page_response(&headers, &auth_state, |token| {
        register_page(&RegisterViewModel::default(), &ModelState::default(), token)
    })
}

#[utoipa::path(
    post,
    path = "/Account/Register",
    request_body(content = RegisterViewModel, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Account created and signed in, redirect to /Home/Index"),
        (status = 200, description = "Form redisplayed with validation or identity errors", content_type = "text/html"),
        (status = 500, description = "Identity store unavailable"),
    ),
    tag = "account"
)]
#[instrument(skip_all)]
pub async fn register(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    Form(model): Form<RegisterViewModel>,
) -> Response {
    let mut state = model.validate();
    if !state.is_valid() {
        debug!("registration form invalid");
        return redisplay(&headers, &auth_state, &model, &state);
    }

    // The email doubles as the username; the optional display name is kept as `name`.
    let new_user = NewUser {
        user_name: model.email.clone(),
        email: model.email.clone(),
        name: model.user_name.clone(),
        login: None,
    };

    let user = match auth_state
        .identity()
        .create_user(new_user, &model.password)
        .await
    {
        Ok(IdentityResult::Succeeded(user)) => user,
        Ok(IdentityResult::Failed(errors)) => {
            for error in errors {
                state.add_model_error(error.description);
            }
            return redisplay(&headers, &auth_state, &model, &state);
        }
        Err(err) => return internal_error("Failed to create user", &err),
    };

    let session = match auth_state.identity().sign_in(&user, false).await {
        Ok(session) => session,
        Err(err) => return internal_error("Failed to sign in new user", &err),
    };

    info!(user_id = %user.id, "user registered");
    end_previous_session(&headers, &auth_state).await;
    signed_in_redirect(&session, auth_state.cookie_secure(), HOME_PATH)
}

fn redisplay(
    headers: &HeaderMap,
    auth_state: &AuthState,
    model: &RegisterViewModel,
    state: &ModelState,
) -> Response {
    let model = model.without_passwords();
    page_response(headers, auth_state, |token| {
        register_page(&model, state, token)
    })
}
