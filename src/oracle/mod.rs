mod dto;
pub mod handlers;
pub mod responses;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
