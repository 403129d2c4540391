//! Request admission and backend streaming primitives for streamgate.
//!
//! - [`admission`]: the bounded [`AdmissionGate`] shared by all request flows.
//! - [`backend`]: the [`Backend`] abstraction over a cancellable
//!   server-streaming generation call, and its gRPC implementation.
//!
//! Every suspending operation takes the request's cancellation scope
//! ([`CancellationToken`]) explicitly.

pub mod admission;
pub mod backend;
mod error;

pub use admission::{AdmissionGate, Permit};
pub use backend::grpc::GrpcBackend;
pub use backend::{Backend, GenerateParams, IncrementStream, StreamItem};
pub use error::{BackendError, GateError};
pub use tokio_util::sync::CancellationToken;
