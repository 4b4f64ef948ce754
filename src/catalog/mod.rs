pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

use axum::Router;

use crate::state::CatalogState;

pub fn router() -> Router<CatalogState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
