//! Account pages: register, login and logoff.
//!
//! Handlers are thin: validate the posted view model, call the
//! [`IdentityService`](crate::identity::IdentityService) held by [`AuthState`],
//! then either redirect or redisplay the form with its errors.
//!
//! ## Cookies
//!
//! - `mynotes_session` carries the opaque session token (`HttpOnly`,
//!   `SameSite=Lax`). Remember-me sign-ins add `Max-Age`.
//! - `mynotes_antiforgery` carries the double-submit token echoed by every
//!   form in the `__RequestVerificationToken` field. Login and logoff reject
//!   posts where the pair is missing or differs.
//!
//! ## Redirects
//!
//! Successful posts answer `303 See Other`. A login `returnUrl` is followed only
//! when [`is_local_url`] accepts it; anything else falls back to `/Home/Index`.

pub mod antiforgery;
pub mod forms;
pub mod login;
pub mod logoff;
pub mod profile;
mod redirect;
pub mod register;
pub(crate) mod session;
mod state;
pub(crate) mod views;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

pub use redirect::is_local_url;
pub use state::AuthState;

pub const HOME_PATH: &str = "/Home/Index";
pub const LOGIN_PATH: &str = "/Account/Login";

/// Log an infrastructure failure and answer 500 without leaking details.
pub(crate) fn internal_error(context: &str, err: &anyhow::Error) -> Response {
    error!("{context}: {err:#}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error".to_string(),
    )
        .into_response()
}
