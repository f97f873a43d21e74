use axum::Router;

use crate::state::AppState;

pub mod forms;
pub mod handlers;
pub mod repo;

pub fn router() -> Router<AppState> {
    handlers::router()
}
