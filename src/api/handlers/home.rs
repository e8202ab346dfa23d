use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::account::{
    AuthState,
    session::current_user,
    views::{home_page, page_response},
};

#[utoipa::path(
    get,
    path = "/Home/Index",
    responses(
        (status = 200, description = "Home page, greeting the signed-in user if any", content_type = "text/html"),
    ),
    tag = "home"
)]
// axum handler for the home page, also mounted on `/`
pub async fn index(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    let user = match current_user(&headers, &auth_state).await {
        Ok(user) => user,
        Err(status) => return status.into_response(),
    };
    page_response(&headers, &auth_state, |token| {
        home_page(user.as_ref(), token)
    })
}
