//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints of the todo backend:
//! - Auth API endpoints (register, login, logout, profile)
//! - Todo API endpoints (protected)
//! - Health check

pub mod auth;
pub mod common;
pub mod middleware;
pub mod responses;
pub mod todos;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, CurrentUser};

use responses::HealthResponse;

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need a live session)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .merge(todos::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::public_router())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    // Bearer tokens travel in a header, so credentials mode is not needed
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    let cors = match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!(cors_origin, error = %e, "Invalid CORS origin, allowing any origin");
            cors.allow_origin(Any)
        }
    };

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /api/v1/health - Store reachability
async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let timeout = state.config.auth.store_timeout();

    match tokio::time::timeout(timeout, state.pool.ping()).await {
        Ok(Ok(())) => Ok(Json(HealthResponse {
            status: "ok".to_string(),
        })),
        Ok(Err(e)) => {
            tracing::error!(error = ?e, "Health check failed");
            Err(ApiError::service_unavailable("Database unavailable"))
        }
        Err(_) => {
            tracing::error!(?timeout, "Health check timed out");
            Err(ApiError::service_unavailable("Database unavailable"))
        }
    }
}
