use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::auth::service::normalize_email;
use crate::forms::{non_empty, FormErrors};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Raw login submission. Authentication itself happens in the handler; this
/// only checks that both fields were filled in.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        if self.username.trim().is_empty() {
            errors.add("username", "This field is required.");
        }
        if self.password.trim().is_empty() {
            errors.add("password", "This field is required.");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Raw registration submission.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Validated registration fields, email already normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<NewUser, FormErrors> {
        let mut errors = FormErrors::new();

        let email = normalize_email(&self.email);
        if email.is_empty() {
            errors.add("email", "This field is required.");
        } else if !is_valid_email(&email) {
            errors.add("email", "Enter a valid email address.");
        }

        if self.password.trim().is_empty() {
            errors.add("password", "This field is required.");
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(NewUser {
            name: non_empty(&self.name),
            email,
            password: self.password.clone(),
        })
    }
}
