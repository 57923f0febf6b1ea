use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod memory;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod store;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new().merge(handlers::admin_routes(state))
}
