//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! Internal errors are logged with full detail but only a generic message is
//! returned to the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use streamgate_core::{BackendError, GateError};
use thiserror::Error;
use tracing::{error, warn};

use crate::chat::assemble::AssembleError;
use crate::chat::translate::ValidationError;

/// All errors that can end a request before or instead of a 200 response.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The body was not valid JSON for a chat-completion request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request decoded but cannot be turned into a backend call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No admission slot freed up before the request's wait was cancelled.
    #[error("too many concurrent requests")]
    AdmissionRejected,

    /// The backend call could not be started.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(BackendError),

    /// The backend failed after the call was started.
    #[error("backend stream failed: {0}")]
    BackendStream(BackendError),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ServerError::AdmissionRejected => {
                (StatusCode::TOO_MANY_REQUESTS, self.to_string())
            }
            ServerError::BackendUnavailable(e) => {
                warn!(error = %e, "failed to start backend stream");
                (StatusCode::BAD_GATEWAY, "failed to start stream".to_owned())
            }
            ServerError::BackendStream(e) => {
                warn!(error = %e, "backend stream failed");
                (StatusCode::BAD_GATEWAY, "backend stream failed".to_owned())
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<GateError> for ServerError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::Rejected => ServerError::AdmissionRejected,
        }
    }
}

impl From<AssembleError> for ServerError {
    fn from(e: AssembleError) -> Self {
        match e {
            AssembleError::Stream(e) => ServerError::BackendStream(e),
            other => ServerError::Internal(other.to_string()),
        }
    }
}
