//! gRPC implementation of [`Backend`] on top of the generated
//! `LLMService` client.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use streamgate_proto::{GenerateRequest, LlmServiceClient};
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use super::{Backend, GenerateParams, IncrementStream};
use crate::error::BackendError;

/// Backend reached over a single multiplexed gRPC channel.
///
/// Cloning is cheap; every clone shares the channel.
#[derive(Debug, Clone)]
pub struct GrpcBackend {
    client: LlmServiceClient<Channel>,
}

impl GrpcBackend {
    /// Build a backend whose channel connects on first use.
    ///
    /// The process can start while the worker is still down; calls made in
    /// the meantime fail fast with [`BackendError::Unavailable`].
    pub fn connect_lazy(address: &str, connect_timeout: Duration) -> Result<Self, BackendError> {
        let endpoint = Endpoint::from_shared(address.to_owned())
            .map_err(|e| {
                BackendError::Unavailable(format!("invalid backend address '{address}': {e}"))
            })?
            .connect_timeout(connect_timeout);
        Ok(Self::from_channel(endpoint.connect_lazy()))
    }

    pub fn from_channel(channel: Channel) -> Self {
        Self {
            client: LlmServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl Backend for GrpcBackend {
    async fn open(
        &self,
        params: GenerateParams,
        cancel: CancellationToken,
    ) -> Result<IncrementStream, BackendError> {
        let mut client = self.client.clone();
        let request = GenerateRequest {
            prompt: params.prompt,
            max_tokens: i32::try_from(params.max_tokens).unwrap_or(i32::MAX),
            temperature: params.temperature,
        };
        debug!(
            max_tokens = request.max_tokens,
            temperature = request.temperature,
            "opening backend stream"
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BackendError::Cancelled),
            response = client.generate(request) => response,
        };
        let streaming = response
            .map_err(|status| BackendError::Unavailable(describe(&status)))?
            .into_inner();

        let increments = streaming.map(|message| {
            message
                .map(|m| m.generated_text)
                .map_err(|status| BackendError::Stream(describe(&status)))
        });
        Ok(IncrementStream::new(increments, cancel))
    }
}

fn describe(status: &tonic::Status) -> String {
    format!("{:?}: {}", status.code(), status.message())
}
