use axum::extract::{FromRef, Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::auth::forms::{LoginForm, RegisterForm};
use crate::auth::password::hash_password;
use crate::auth::repo;
use crate::auth::service::authenticate_by_email;
use crate::auth::session::{
    clear_flash_cookie, clear_session_cookie, current_user, flash_cookie, session_cookie,
    take_flash, SessionKeys,
};
use crate::error::{is_unique_violation, AppError};
use crate::forms::FormErrors;
use crate::render::render_page;
use crate::state::AppState;

/// Shown for every failed login, whatever the actual reason. Unknown email,
/// inactive account and wrong password must be indistinguishable here.
const LOGIN_ERROR: &str = "Incorrect username or password. Try again.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/", get(login_page).post(login_submit))
        .route("/logout/", get(logout))
        .route("/register", get(register_page).post(register_submit))
}

#[derive(Debug, Default, Deserialize)]
struct LoginQuery {
    #[serde(default)]
    next: Option<String>,
}

/// Only follow an in-app path after login; anything else could bounce the
/// user to a foreign site.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//"))
}

fn login_context(
    form: &LoginForm,
    error: Option<&str>,
    errors: &FormErrors,
    next: Option<&str>,
    flash: Option<&str>,
) -> serde_json::Value {
    serde_json::json!({
        "form": { "username": form.username, "next": next },
        "error": error,
        "errors": errors,
        "flash": flash,
    })
}

#[instrument(skip_all)]
async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if current_user(&state, &headers).await.is_some() {
        return Ok(Redirect::to("/appointments/").into_response());
    }
    let flash = take_flash(&headers);
    let context = login_context(
        &LoginForm::default(),
        None,
        &FormErrors::new(),
        safe_next(query.next.as_deref()),
        flash.as_deref(),
    );
    let page = render_page(&state.renderer, "user/login.html", &context)?;
    if flash.is_some() {
        Ok((
            [(SET_COOKIE, clear_flash_cookie(state.config.session.cookie_secure))],
            page,
        )
            .into_response())
    } else {
        Ok(page.into_response())
    }
}

#[instrument(skip_all)]
async fn login_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let next = safe_next(form.next.as_deref()).map(str::to_string);

    if let Err(errors) = form.validate() {
        let context = login_context(&form, None, &errors, next.as_deref(), None);
        let page = render_page(&state.renderer, "user/login.html", &context)?;
        return Ok(page.into_response());
    }

    let outcome = authenticate_by_email(&state.db, &form.username, &form.password).await?;
    match outcome {
        crate::auth::service::AuthOutcome::Authenticated(user) => {
            let keys = SessionKeys::from_ref(&state);
            let user_agent = headers
                .get(axum::http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok());
            let token = keys.sign(user.id, user_agent).map_err(AppError::Internal)?;
            info!(user_id = user.id, "user logged in");
            let target = next.as_deref().unwrap_or("/appointments/").to_string();
            Ok((
                [(
                    SET_COOKIE,
                    session_cookie(&token, keys.ttl(), state.config.session.cookie_secure),
                )],
                Redirect::to(&target),
            )
                .into_response())
        }
        _ => {
            // The outcome was already logged with its real reason; the page
            // only ever gets the generic message.
            let context =
                login_context(&form, Some(LOGIN_ERROR), &FormErrors::new(), next.as_deref(), None);
            let page = render_page(&state.renderer, "user/login.html", &context)?;
            Ok(page.into_response())
        }
    }
}

#[instrument(skip_all)]
async fn logout(State(state): State<AppState>) -> Response {
    (
        [(
            SET_COOKIE,
            clear_session_cookie(state.config.session.cookie_secure),
        )],
        Redirect::to("/login/"),
    )
        .into_response()
}

fn register_context(form: &RegisterForm, errors: &FormErrors) -> serde_json::Value {
    serde_json::json!({
        "form": { "name": form.name, "email": form.email },
        "errors": errors,
    })
}

#[instrument(skip_all)]
async fn register_page(State(state): State<AppState>) -> Result<Response, AppError> {
    let context = register_context(&RegisterForm::default(), &FormErrors::new());
    let page = render_page(&state.renderer, "user/register.html", &context)?;
    Ok(page.into_response())
}

#[instrument(skip_all)]
async fn register_submit(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let new_user = match form.validate() {
        Ok(new_user) => new_user,
        Err(errors) => {
            let page =
                render_page(&state.renderer, "user/register.html", &register_context(&form, &errors))?;
            return Ok(page.into_response());
        }
    };

    // Hash exactly what the credential model would store: the trimmed
    // plaintext, case preserved.
    let hash = hash_password(new_user.password.trim()).map_err(AppError::Internal)?;

    match repo::create(&state.db, new_user.name.as_deref(), &new_user.email, &hash).await {
        Ok(user) => {
            info!(user_id = user.id, email = %user.email, "user registered");
            Ok((
                [(
                    SET_COOKIE,
                    flash_cookie(
                        "User successfully registered",
                        state.config.session.cookie_secure,
                    ),
                )],
                Redirect::to("/login/"),
            )
                .into_response())
        }
        Err(e) if is_unique_violation(&e) => {
            let mut errors = FormErrors::new();
            errors.add("email", "That email is already registered.");
            let page =
                render_page(&state.renderer, "user/register.html", &register_context(&form, &errors))?;
            Ok(page.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_next_only_accepts_in_app_paths() {
        assert_eq!(safe_next(Some("/appointments/3/")), Some("/appointments/3/"));
        assert_eq!(safe_next(Some("https://evil.example/")), None);
        assert_eq!(safe_next(Some("//evil.example/")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn login_context_carries_generic_error_only() {
        let form = LoginForm {
            username: "ron@example.com".into(),
            password: "whatever".into(),
            next: None,
        };
        let context = login_context(&form, Some(LOGIN_ERROR), &FormErrors::new(), None, None);
        assert_eq!(
            context["error"],
            serde_json::json!("Incorrect username or password. Try again.")
        );
        // The submitted password never reaches the template context.
        assert!(context["form"].get("password").is_none());
    }
}
