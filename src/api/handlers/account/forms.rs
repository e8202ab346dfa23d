//! View models posted by the account forms and their validation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Field and summary errors collected while handling a form.
///
/// An error with no field is a form-level (summary) error.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModelState {
    errors: Vec<(Option<&'static str>, String)>,
}

impl ModelState {
    pub fn add_field_error(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push((Some(field), message.into()));
    }

    pub fn add_model_error(&mut self, message: impl Into<String>) {
        self.errors.push((None, message.into()));
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Messages attached to `field`.
    pub fn field_errors<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.errors
            .iter()
            .filter(move |(name, _)| *name == Some(field))
            .map(|(_, message)| message.as_str())
    }

    /// Messages not bound to any field.
    pub fn summary(&self) -> impl Iterator<Item = &str> {
        self.errors
            .iter()
            .filter(|(name, _)| name.is_none())
            .map(|(_, message)| message.as_str())
    }
}

fn required(state: &mut ModelState, field: &'static str, display: &str, value: &str) {
    if value.trim().is_empty() {
        state.add_field_error(field, format!("The {display} field is required."));
    }
}

static EMAIL_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

fn valid_email(email: &str) -> bool {
    EMAIL_PATTERN.as_ref().is_some_and(|re| re.is_match(email))
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterViewModel {
    #[serde(default)]
    pub email: String,
    /// Optional display name.
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default, skip_serializing)]
    pub password_confirm: String,
    #[serde(default, rename = "__RequestVerificationToken", skip_serializing)]
    pub request_verification_token: Option<String>,
}

impl RegisterViewModel {
    pub const EMAIL: &'static str = "Email";
    pub const USER_NAME: &'static str = "UserName";
    pub const PASSWORD: &'static str = "Password";
    pub const PASSWORD_CONFIRM: &'static str = "PasswordConfirm";

    #[must_use]
    pub fn validate(&self) -> ModelState {
        let mut state = ModelState::default();

        required(&mut state, Self::EMAIL, "Email", &self.email);
        if !self.email.trim().is_empty() && !valid_email(self.email.trim()) {
            state.add_field_error(Self::EMAIL, "The Email field is not a valid e-mail address.");
        }

        required(&mut state, Self::PASSWORD, "Password", &self.password);
        required(
            &mut state,
            Self::PASSWORD_CONFIRM,
            "Confirm password",
            &self.password_confirm,
        );
        if !self.password_confirm.is_empty() && self.password != self.password_confirm {
            state.add_field_error(Self::PASSWORD_CONFIRM, "Passwords do not match");
        }

        state
    }

    /// Copy suitable for redisplay: password fields are never echoed back.
    #[must_use]
    pub fn without_passwords(&self) -> Self {
        Self {
            email: self.email.clone(),
            user_name: self.user_name.clone(),
            ..Self::default()
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct LoginViewModel {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    /// Checkbox; absent means `false`.
    #[serde(default)]
    pub remember_me: bool,
    #[serde(default)]
    pub return_url: Option<String>,
    #[serde(default, rename = "__RequestVerificationToken", skip_serializing)]
    pub request_verification_token: Option<String>,
}

impl LoginViewModel {
    pub const EMAIL: &'static str = "Email";
    pub const PASSWORD: &'static str = "Password";

    #[must_use]
    pub fn validate(&self) -> ModelState {
        let mut state = ModelState::default();
        required(&mut state, Self::EMAIL, "Email", &self.email);
        required(&mut state, Self::PASSWORD, "Password", &self.password);
        state
    }

    #[must_use]
    pub fn without_password(&self) -> Self {
        Self {
            email: self.email.clone(),
            remember_me: self.remember_me,
            return_url: self.return_url.clone(),
            ..Self::default()
        }
    }
}

/// Query string accepted by `GET /Account/Login`.
#[derive(IntoParams, Deserialize, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct LoginQuery {
    /// Local path to return to after a successful login.
    #[serde(rename = "returnUrl", alias = "ReturnUrl")]
    pub return_url: Option<String>,
}

/// Body of `POST /Account/LogOff`.
#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct LogOffForm {
    #[serde(default, rename = "__RequestVerificationToken")]
    pub request_verification_token: Option<String>,
}
