use thiserror::Error;

/// Errors produced by the [`AdmissionGate`](crate::AdmissionGate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// The caller's cancellation scope fired before a permit became free.
    #[error("admission rejected: cancelled while waiting for a slot")]
    Rejected,
}

/// Errors produced while opening or reading a backend stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The call could not be started; no increment was produced.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The stream failed after it was opened.
    #[error("backend stream failed: {0}")]
    Stream(String),

    /// The request's cancellation scope fired.
    #[error("backend call cancelled")]
    Cancelled,
}
