//! Server-rendered HTML for the account pages.
//!
//! Every interpolated value goes through [`escape_html`].

use axum::{
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
};
use std::fmt::Write as _;

use super::{
    AuthState,
    antiforgery::{ANTIFORGERY_FIELD, AntiforgeryToken},
    forms::{LoginViewModel, ModelState, RegisterViewModel},
    internal_error,
};
use crate::identity::User;

/// Render a page that embeds forms, issuing the anti-forgery cookie if the
/// browser does not hold one yet.
pub(crate) fn page_response(
    headers: &HeaderMap,
    auth_state: &AuthState,
    render: impl FnOnce(&str) -> String,
) -> Response {
    let token = match AntiforgeryToken::for_request(headers, auth_state.antiforgery_key()) {
        Ok(token) => token,
        Err(err) => return internal_error("Failed to issue anti-forgery token", &err),
    };
    let mut response_headers = HeaderMap::new();
    token.apply(&mut response_headers, auth_state.cookie_secure());
    (response_headers, Html(render(token.value()))).into_response()
}

#[must_use]
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title} - MyNotes</title>\n</head>\n<body>\n\
         <nav><a href=\"/Home/Index\">MyNotes</a></nav>\n<main>\n<h2>{title}</h2>\n{body}</main>\n\
         </body>\n</html>\n",
        title = escape_html(title),
    )
}

fn token_field(token: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"{ANTIFORGERY_FIELD}\" value=\"{}\">\n",
        escape_html(token)
    )
}

fn summary(state: &ModelState) -> String {
    let mut items = String::new();
    for message in state.summary() {
        let _ = writeln!(items, "<li>{}</li>", escape_html(message));
    }
    if items.is_empty() {
        return String::new();
    }
    format!("<div class=\"validation-summary-errors\"><ul>\n{items}</ul></div>\n")
}

fn field_errors(state: &ModelState, field: &str) -> String {
    state
        .field_errors(field)
        .map(|message| {
            format!(
                "<span class=\"field-validation-error\" data-valmsg-for=\"{field}\">{}</span>\n",
                escape_html(message)
            )
        })
        .collect()
}

fn input(state: &ModelState, field: &str, label: &str, kind: &str, value: &str) -> String {
    format!(
        "<div>\n<label for=\"{field}\">{label}</label>\n\
         <input id=\"{field}\" name=\"{field}\" type=\"{kind}\" value=\"{}\">\n{}</div>\n",
        escape_html(value),
        field_errors(state, field),
    )
}

fn logoff_form(token: &str) -> String {
    format!(
        "<form method=\"post\" action=\"/Account/LogOff\">\n{}<button type=\"submit\">Log off</button>\n</form>\n",
        token_field(token)
    )
}

fn display_name(user: &User) -> &str {
    user.name.as_deref().unwrap_or(&user.email)
}

#[must_use]
pub fn register_page(model: &RegisterViewModel, state: &ModelState, token: &str) -> String {
    let mut body = String::from("<form method=\"post\" action=\"/Account/Register\">\n");
    body.push_str(&token_field(token));
    body.push_str(&summary(state));
    body.push_str(&input(
        state,
        RegisterViewModel::EMAIL,
        "Email",
        "email",
        &model.email,
    ));
    body.push_str(&input(
        state,
        RegisterViewModel::USER_NAME,
        "Name",
        "text",
        model.user_name.as_deref().unwrap_or_default(),
    ));
    body.push_str(&input(
        state,
        RegisterViewModel::PASSWORD,
        "Password",
        "password",
        "",
    ));
    body.push_str(&input(
        state,
        RegisterViewModel::PASSWORD_CONFIRM,
        "Confirm password",
        "password",
        "",
    ));
    body.push_str("<button type=\"submit\">Register</button>\n</form>\n");
    layout("Register", &body)
}

#[must_use]
pub fn login_page(model: &LoginViewModel, state: &ModelState, token: &str) -> String {
    let mut body = String::from("<form method=\"post\" action=\"/Account/Login\">\n");
    body.push_str(&token_field(token));
    let _ = writeln!(
        body,
        "<input type=\"hidden\" name=\"ReturnUrl\" value=\"{}\">",
        escape_html(model.return_url.as_deref().unwrap_or_default())
    );
    body.push_str(&summary(state));
    body.push_str(&input(
        state,
        LoginViewModel::EMAIL,
        "Email",
        "email",
        &model.email,
    ));
    body.push_str(&input(
        state,
        LoginViewModel::PASSWORD,
        "Password",
        "password",
        "",
    ));
    let checked = if model.remember_me { " checked" } else { "" };
    let _ = writeln!(
        body,
        "<div>\n<input id=\"RememberMe\" name=\"RememberMe\" type=\"checkbox\" value=\"true\"{checked}>\n\
         <label for=\"RememberMe\">Remember me?</label>\n</div>"
    );
    body.push_str("<button type=\"submit\">Log in</button>\n</form>\n");
    body.push_str("<p><a href=\"/Account/Register\">Register as a new user</a></p>\n");
    layout("Log in", &body)
}

#[must_use]
pub fn home_page(user: Option<&User>, token: &str) -> String {
    let body = match user {
        Some(user) => format!(
            "<p>Hello, <a href=\"/Account/Profile\">{}</a>!</p>\n{}",
            escape_html(display_name(user)),
            logoff_form(token)
        ),
        None => "<p><a href=\"/Account/Login\">Log in</a> or \
                 <a href=\"/Account/Register\">register</a> to keep your notes.</p>\n"
            .to_string(),
    };
    layout("Home", &body)
}

#[must_use]
pub fn profile_page(user: &User, token: &str) -> String {
    let mut body = String::from("<dl>\n");
    let _ = writeln!(body, "<dt>Email</dt><dd>{}</dd>", escape_html(&user.email));
    if let Some(name) = &user.name {
        let _ = writeln!(body, "<dt>Name</dt><dd>{}</dd>", escape_html(name));
    }
    if let Some(login) = &user.login {
        let _ = writeln!(body, "<dt>Login</dt><dd>{}</dd>", escape_html(login));
    }
    body.push_str("</dl>\n");
    body.push_str(&logoff_form(token));
    layout("Profile", &body)
}
