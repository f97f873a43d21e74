use axum::extract::{Path, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{delete as delete_route, get};
use axum::{Form, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::appointments::forms::AppointmentForm;
use crate::appointments::repo::{self, Appointment};
use crate::auth::guard::{authorize_owner, Owned};
use crate::auth::session::{clear_flash_cookie, take_flash, CurrentUser};
use crate::error::AppError;
use crate::filters::{format_date, format_datetime, humanize_duration, nl2br};
use crate::forms::FormErrors;
use crate::render::{render_not_found, render_page};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments/", get(list))
        .route("/appointments/create/", get(create_page).post(create_submit))
        .route("/appointments/:id/", get(detail))
        .route("/appointments/:id/edit/", get(edit_page).post(edit_submit))
        .route("/appointments/:id/delete/", delete_route(remove))
}

/// Display values for one appointment. All-day appointments show dates
/// only; duration is omitted when undefined.
fn appointment_context(appt: &Appointment) -> Value {
    let show = |dt| {
        if appt.allday {
            format_date(dt)
        } else {
            format_datetime(dt)
        }
    };
    json!({
        "id": appt.id,
        "title": appt.title,
        "start": show(appt.start_at),
        "end": appt.end_at.map(show),
        "allday": appt.allday,
        "location": appt.location,
        "description": appt.description.as_deref().map(nl2br),
        "duration": appt.duration_seconds().map(humanize_duration),
    })
}

fn form_context(form: &AppointmentForm, errors: &FormErrors) -> Value {
    json!({
        "form": {
            "title": form.title,
            "start": form.start,
            "end": form.end,
            "allday": form.allday.is_some(),
            "location": form.location,
            "description": form.description,
        },
        "errors": errors,
    })
}

#[instrument(skip_all)]
async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let appts = repo::list_for_user(&state.db, user.id).await?;
    let flash = take_flash(&headers);
    let context = json!({
        "appts": appts.iter().map(appointment_context).collect::<Vec<_>>(),
        "flash": flash,
    });
    let page = render_page(&state.renderer, "appointment/index.html", &context)?;
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

#[instrument(skip_all, fields(id = id))]
async fn detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let found = repo::get_by_id(&state.db, id).await?;
    // This page maps a foreign appointment to the same 404 as a missing
    // one; only edit and delete distinguish 403 from 404.
    match authorize_owner(found, user.id) {
        Ok(appt) => {
            let context = json!({ "appt": appointment_context(&appt) });
            let page = render_page(&state.renderer, "appointment/detail.html", &context)?;
            Ok(page.into_response())
        }
        Err(AppError::NotFound) | Err(AppError::Forbidden) => Ok(render_not_found(&state)),
        Err(e) => Err(e),
    }
}

#[instrument(skip_all)]
async fn create_page(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Response, AppError> {
    let context = form_context(&AppointmentForm::default(), &FormErrors::new());
    let page = render_page(&state.renderer, "appointment/edit.html", &context)?;
    Ok(page.into_response())
}

#[instrument(skip_all)]
async fn create_submit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<AppointmentForm>,
) -> Result<Response, AppError> {
    let fields = match form.validate() {
        Ok(fields) => fields,
        Err(errors) => {
            let page =
                render_page(&state.renderer, "appointment/edit.html", &form_context(&form, &errors))?;
            return Ok(page.into_response());
        }
    };

    let mut tx = state.db.begin().await?;
    let appt = repo::create(&mut *tx, user.id, &fields).await?;
    tx.commit().await?;

    info!(appointment_id = appt.id, user_id = user.id, "appointment created");
    Ok(Redirect::to("/appointments/").into_response())
}

#[instrument(skip_all, fields(id = id))]
async fn edit_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let found = repo::get_by_id(&state.db, id).await?;
    let appt = authorize_owner(found, user.id)?;
    let context = form_context(&AppointmentForm::from_appointment(&appt), &FormErrors::new());
    let page = render_page(&state.renderer, "appointment/edit.html", &context)?;
    Ok(page.into_response())
}

#[instrument(skip_all, fields(id = id))]
async fn edit_submit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<AppointmentForm>,
) -> Result<Response, AppError> {
    let found = repo::get_by_id(&state.db, id).await?;
    let appt = authorize_owner(found, user.id)?;

    let fields = match form.validate() {
        Ok(fields) => fields,
        Err(errors) => {
            let page =
                render_page(&state.renderer, "appointment/edit.html", &form_context(&form, &errors))?;
            return Ok(page.into_response());
        }
    };

    let mut tx = state.db.begin().await?;
    let updated = repo::update(&mut *tx, appt.id, &fields).await?;
    tx.commit().await?;

    info!(appointment_id = updated.id, user_id = user.id, "appointment updated");
    Ok(Redirect::to(&format!("/appointments/{}/", updated.id)).into_response())
}

#[derive(Debug, Serialize)]
struct DeleteStatus {
    status: &'static str,
}

/// The delete endpoint speaks JSON: existence first, then ownership, with
/// distinct 404/403 bodies.
fn delete_outcome<T: Owned>(
    found: Option<T>,
    caller_id: i64,
) -> Result<T, (StatusCode, &'static str)> {
    match authorize_owner(found, caller_id) {
        Ok(record) => Ok(record),
        Err(AppError::NotFound) => Err((StatusCode::NOT_FOUND, "Not Found")),
        Err(AppError::Forbidden) => Err((StatusCode::FORBIDDEN, "Forbidden")),
        Err(_) => Err((StatusCode::INTERNAL_SERVER_ERROR, "Error")),
    }
}

#[instrument(skip_all, fields(id = id))]
async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let found = repo::get_by_id(&state.db, id).await?;
    let appt = match delete_outcome(found, user.id) {
        Ok(appt) => appt,
        Err((code, status)) => {
            return Ok((code, Json(DeleteStatus { status })).into_response());
        }
    };

    let mut tx = state.db.begin().await?;
    repo::delete(&mut *tx, appt.id).await?;
    tx.commit().await?;

    info!(appointment_id = appt.id, user_id = user.id, "appointment deleted");
    Ok(Json(DeleteStatus { status: "OK" }).into_response())
}
