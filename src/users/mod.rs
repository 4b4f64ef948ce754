pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod verification;

use axum::Router;

use crate::state::UserState;

pub fn router() -> Router<UserState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::user_routes())
}
