use axum::Router;

use crate::state::AppState;

pub mod forms;
pub mod guard;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod service;
pub mod session;

pub fn router() -> Router<AppState> {
    handlers::router()
}
