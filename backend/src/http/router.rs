//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{body::Body, http::Request, routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([handlers::DEGRADED_SOURCES_HEADER]);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        tracing::info_span!(
            "request",
            id = %Uuid::new_v4(),
            method = %request.method(),
            uri = %request.uri(),
        )
    });

    let api = Router::new()
        .route("/data", get(handlers::get_combined))
        .route("/data/real", get(handlers::get_real))
        .route("/data/predictions", get(handlers::get_predictions))
        .route("/data/rte-forecasts", get(handlers::get_rte_forecasts))
        .route("/status", get(handlers::get_status))
        .route("/health", get(handlers::health_check));

    Router::new()
        .nest("/api", api)
        .layer(CompressionLayer::new())
        .layer(trace)
        .layer(cors)
        .with_state(state)
}
