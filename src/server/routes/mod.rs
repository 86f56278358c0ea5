//! API routes for the conversion server

pub mod convert;
pub mod status;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all routes.
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(status::index))
        .route("/stats", get(status::stats))
        .route("/convert/by-url", get(convert::convert_by_url))
        // File uploads get a larger body limit
        .route(
            "/convert/by-file",
            post(convert::convert_by_file).layer(DefaultBodyLimit::max(max_upload_size)),
        )
}
