//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use crate::chat::translate::SamplingDefaults;

/// Runtime configuration for streamgate-server.
///
/// Every field has a default so the server works out-of-the-box without any
/// environment variables set. Timeouts configured as `0` are disabled.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8080"`).
    pub bind_address: String,

    /// gRPC endpoint of the generation worker (default: `"http://127.0.0.1:50051"`).
    pub backend_address: String,

    /// TCP connect timeout for the backend channel.
    pub backend_connect_timeout: Duration,

    /// Admission gate capacity: requests forwarded to the backend at once.
    pub max_concurrent_requests: usize,

    /// How long a request may wait for admission before it is rejected
    /// with 429. `None` waits indefinitely.
    pub admission_timeout: Option<Duration>,

    /// Bound on reading the request body.
    pub read_timeout: Option<Duration>,

    /// Bound on producing response headers. Streaming bodies are never cut
    /// by it.
    pub write_timeout: Option<Duration>,

    /// Longest allowed silence between two response body frames.
    pub idle_timeout: Option<Duration>,

    /// SSE keep-alive comment interval. Always kept below `idle_timeout`, so
    /// a slow backend never trips the idle bound on an open stream.
    pub sse_keep_alive: Duration,

    /// Fallback `max_tokens` for requests that omit it.
    pub default_max_tokens: u32,

    /// Fallback `temperature` for requests that omit it.
    pub default_temperature: f32,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated CORS allow-list; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,

    /// Route serving Prometheus text exposition (default: `"/metrics"`).
    pub metrics_path: String,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };
        let secs = |key: &str, default: u64| {
            let secs = parse_or(lookup(key), default);
            (secs > 0).then(|| Duration::from_secs(secs))
        };

        Self {
            bind_address: string("STREAMGATE_BIND", "0.0.0.0:8080"),
            backend_address: string("STREAMGATE_BACKEND_ADDR", "http://127.0.0.1:50051"),
            backend_connect_timeout: Duration::from_secs(parse_or(
                lookup("STREAMGATE_BACKEND_CONNECT_TIMEOUT_SECS"),
                5,
            )),
            max_concurrent_requests: parse_or(lookup("STREAMGATE_MAX_CONCURRENT"), 4usize).max(1),
            admission_timeout: secs("STREAMGATE_ADMISSION_TIMEOUT_SECS", 0),
            read_timeout: secs("STREAMGATE_READ_TIMEOUT_SECS", 5),
            write_timeout: secs("STREAMGATE_WRITE_TIMEOUT_SECS", 0),
            idle_timeout: secs("STREAMGATE_IDLE_TIMEOUT_SECS", 120),
            sse_keep_alive: Duration::from_secs(
                parse_or(lookup("STREAMGATE_SSE_KEEPALIVE_SECS"), 15u64).max(1),
            ),
            default_max_tokens: parse_or(lookup("STREAMGATE_DEFAULT_MAX_TOKENS"), 256u32).max(1),
            default_temperature: parse_or(lookup("STREAMGATE_DEFAULT_TEMPERATURE"), 0.7f32),
            log_level: string("STREAMGATE_LOG", "info"),
            log_json: flag("STREAMGATE_LOG_JSON", false),
            cors_allowed_origins: lookup("STREAMGATE_CORS_ORIGINS").filter(|v| !v.trim().is_empty()),
            enable_swagger: flag("STREAMGATE_ENABLE_SWAGGER", true),
            metrics_path: route_path(&string("STREAMGATE_METRICS_PATH", "/metrics")),
        }
    }

    /// Effective SSE keep-alive interval: the configured one, capped at half
    /// the idle timeout.
    pub fn keep_alive_interval(&self) -> Duration {
        match self.idle_timeout {
            Some(idle) => self.sse_keep_alive.min(idle / 2),
            None => self.sse_keep_alive,
        }
    }

    pub fn sampling_defaults(&self) -> SamplingDefaults {
        SamplingDefaults {
            max_tokens: self.default_max_tokens,
            temperature: self.default_temperature,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn route_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('/');
    if trimmed.is_empty() {
        "/metrics".to_owned()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
