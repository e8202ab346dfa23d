use axum::{
    extract::Extension,
    http::{HeaderMap, Uri},
    response::Response,
};
use std::sync::Arc;

use super::{
    AuthState,
    session::require_user,
    views::{page_response, profile_page},
};

/// Signed-in user's account details. Anonymous visitors are sent to the login
/// page and brought back here afterwards.
#[utoipa::path(
    get,
    path = "/Account/Profile",
    responses(
        (status = 200, description = "Account details", content_type = "text/html"),
        (status = 303, description = "Not signed in, redirect to /Account/Login?returnUrl=..."),
    ),
    tag = "account"
)]
pub async fn profile(
    headers: HeaderMap,
    uri: Uri,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let user = match require_user(&headers, &auth_state, &uri).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    page_response(&headers, &auth_state, |token| profile_page(&user, token))
}
