//! Axum router configuration with middleware.
//!
//! Management routes are under `/api/v1/`. Every other path falls through to
//! the deployment dispatcher, so published workflows answer at their own
//! `api_path` (e.g. `/api/execute/personal-loan`).
//! Middleware: CORS, tracing.

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .merge(handlers::workflow::workflow_routes())
        .merge(handlers::application::application_routes())
        .merge(handlers::scorecard::scorecard_routes())
        .merge(handlers::deployment::deployment_routes());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .fallback(handlers::deployment::serve_deployed)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
