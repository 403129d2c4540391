//! Liveness check.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/healthz", get(get_health))
}

/// Returns `ok` with HTTP 200 while the process is serving.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses(
        (status = 200, description = "Server is alive", body = String)
    )
)]
pub async fn get_health() -> &'static str {
    "ok"
}
