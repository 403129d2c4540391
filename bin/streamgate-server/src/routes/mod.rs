//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection, timeouts)
//! - Optional Swagger UI / OpenAPI document endpoint (disable with `STREAMGATE_ENABLE_SWAGGER=false`)
//! - Liveness and Prometheus metrics routes
//! - OpenAI-compatible `/v1` routes

pub mod doc;
mod health;
mod metrics;
mod v1;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use tower_http::timeout::{RequestBodyTimeoutLayer, ResponseBodyTimeoutLayer, TimeoutLayer};
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .merge(metrics::router(&state.config.metrics_path))
        .nest("/v1", v1::router());

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    // The write timeout only bounds time to response headers; streaming
    // bodies are guarded by the idle timeout between frames instead, which
    // SSE keep-alive comments hold open while the backend is silent.
    if let Some(limit) = state.config.write_timeout {
        app = app.layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, limit));
    }
    if let Some(limit) = state.config.read_timeout {
        app = app.layer(RequestBodyTimeoutLayer::new(limit));
    }
    if let Some(limit) = state.config.idle_timeout {
        app = app.layer(ResponseBodyTimeoutLayer::new(limit));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(cors::cors_layer(&state.config))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
