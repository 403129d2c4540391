//! Generated gRPC bindings for the backend text-generation worker.
//!
//! The gateway only ever uses the client half; the server half exists so
//! tests and local tooling can stand up a scripted worker.

#[allow(clippy::all)]
pub mod llm {
    tonic::include_proto!("llm");
}

pub use llm::llm_service_client::LlmServiceClient;
pub use llm::llm_service_server::{LlmService, LlmServiceServer};
pub use llm::{GenerateRequest, GenerateResponse};
