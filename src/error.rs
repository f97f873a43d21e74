use axum::http::{header::SET_COOKIE, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use thiserror::Error;
use tracing::error;

use crate::auth::session::{flash_cookie, urlencode, LOGIN_NOTICE};

/// Application error taxonomy. Validation failures never reach this type;
/// forms re-render locally with their field errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// No valid session. Turns into a redirect to the login page, carrying
    /// the originally requested path so login can send the caller back.
    #[error("authentication required")]
    Unauthenticated { next: Option<String>, secure: bool },

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthenticated { next, secure } => {
                let target = match next {
                    Some(path) => format!("/login/?next={}", urlencode(&path)),
                    None => "/login/".to_string(),
                };
                (
                    [(SET_COOKIE, flash_cookie(LOGIN_NOTICE, secure))],
                    Redirect::to(&target),
                )
                    .into_response()
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
            AppError::Database(e) => {
                error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

/// True when the database error is a unique-constraint violation, which is
/// how a duplicate registration email surfaces (Postgres SQLSTATE 23505).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}
