//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let ops_routes = Router::new()
        // Ingress and history
        .route("/events", post(handlers::ingest_event).get(handlers::list_events))
        // Prediction
        .route("/predict", post(handlers::run_predict))
        // Workflows
        .route("/workflows", get(handlers::list_workflows).post(handlers::create_workflow))
        .route("/workflows/:id", get(handlers::get_workflow))
        .route("/workflows/:id/:action", post(handlers::transition_workflow))
        // Decisions
        .route("/decisions", get(handlers::list_decisions))
        // Live stream
        .route("/stream", get(handlers::stream_events));

    let api_routes = Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::daemon_status))
        .nest("/ops", ops_routes);

    // Build router with middleware
    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(RequestBodyLimitLayer::new(server.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(server.request_timeout_secs)))
        .layer(TraceLayer::new_for_http());

    if server.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(state)
}
