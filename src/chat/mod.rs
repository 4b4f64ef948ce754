use axum::{routing::get, Json, Router};

use crate::rest::{self, ApiResponse};

pub fn router() -> Router {
    Router::new().route("/", get(hello))
}

async fn hello() -> Json<ApiResponse<&'static str>> {
    rest::ok("Hello World")
}
