use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;

/// CORS layer from `STREAMGATE_CORS_ORIGINS`; permissive when unset or when
/// no entry parses as an origin.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let base = CorsLayer::new().allow_headers(Any).allow_methods(Any);

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_origin(origins)
    }
}
