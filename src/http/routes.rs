use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Capture control
        .route("/captures", post(handlers::start_capture))
        .route("/captures/:capture_id/stop", post(handlers::stop_capture))
        .route("/captures/:capture_id", delete(handlers::delete_capture))
        // Capture queries
        .route(
            "/captures/:capture_id/status",
            get(handlers::get_capture_status),
        )
        .route(
            "/captures/:capture_id/transcript",
            get(handlers::get_capture_transcript),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // Browser front ends call this API directly
        .layer(CorsLayer::permissive())
        .with_state(state)
}
