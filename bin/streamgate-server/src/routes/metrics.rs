//! Prometheus scrape endpoint.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use crate::error::ServerError;
use crate::state::AppState;

/// Register the scrape route at `path` (`STREAMGATE_METRICS_PATH`).
pub fn router(path: &str) -> Router<Arc<AppState>> {
    Router::new().route(path, get(get_metrics))
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Result<Response, ServerError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| ServerError::Internal(format!("failed to render metrics: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}
