//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - permissive for development, should be restricted in production
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Submissions are a few hundred bytes; the cap rejects oversized bodies
    // before attribution content is ever parsed.
    let max_body_bytes = state.config.gate.max_body_bytes;

    // Build the API router with versioned endpoints
    let api_v1 = Router::new()
        // Report ingestion
        .route("/reports", post(handlers::submit_report))
        // Feed and snapshots
        .route(
            "/locations/{location_id}/reports",
            get(handlers::get_location_reports),
        )
        .route(
            "/locations/{location_id}/snapshot",
            get(handlers::get_location_snapshot),
        )
        .route("/snapshots", get(handlers::get_snapshots))
        // Privileged retention pruning
        .route("/admin/prune", post(handlers::prune_reports));

    // Combine all routes
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
