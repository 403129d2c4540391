//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use streamgate_core::{AdmissionGate, Backend};

use crate::config::Config;
use crate::metrics::Metrics;

/// State shared across all HTTP handlers.
///
/// The admission gate and the metric series are the only mutable state
/// shared between requests.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Bounds the requests concurrently forwarded to the backend.
    pub gate: AdmissionGate,
    /// Opens generation streams on the worker.
    pub backend: Arc<dyn Backend>,
    /// Request, chunk and latency series served on the metrics route.
    pub metrics: Metrics,
}

impl AppState {
    /// Build state with a gate sized from `config.max_concurrent_requests`.
    ///
    /// Fails only if the metric series cannot be registered.
    pub fn new(config: Config, backend: Arc<dyn Backend>) -> Result<Self, prometheus::Error> {
        let gate = AdmissionGate::new(config.max_concurrent_requests);
        Ok(Self {
            config: Arc::new(config),
            gate,
            backend,
            metrics: Metrics::new()?,
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("gate", &self.gate)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}
