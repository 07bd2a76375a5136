pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::pricing::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Recommendations API
        .route(
            "/api/v1/recommendations",
            post(handlers::handle_create_recommendation).get(handlers::handle_list_recommendations),
        )
        .route(
            "/api/v1/recommendations/preview",
            post(handlers::handle_preview),
        )
        .route(
            "/api/v1/recommendations/:id",
            get(handlers::handle_get_recommendation),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
