//! OpenAI-compatible chat-completion route.
//!
//! A request runs translate → admit → open → assemble. Translation happens
//! before admission, so malformed requests never occupy a gate slot. Every
//! request owns a root [`CancellationToken`] whose drop guard lives in the
//! handler future (buffered) or in the SSE body (streaming): a client
//! disconnect drops it and cancels the backend call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use streamgate_core::{BackendError, CancellationToken, IncrementStream, Permit};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::DropGuard;
use tracing::{Instrument, Span, debug, info, warn};
use utoipa::OpenApi;

use crate::chat::assemble::{
    AssembleError, BufferedAssembler, Frame, RequestMeta, SseAssembler, assemble,
};
use crate::chat::translate::translate;
use crate::chat::word_count;
use crate::error::ServerError;
use crate::metrics::Metrics;
use crate::schemas::v1::chat::{
    ChatChoice, ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    ChunkChoice, ChunkDelta, StreamOptions, Usage,
};
use crate::state::AppState;

/// SSE frames queued ahead of a slow client before the producer waits.
const FRAME_BUFFER: usize = 8;

#[derive(OpenApi)]
#[openapi(
    paths(chat_completions),
    components(schemas(
        ChatCompletionRequest,
        ChatCompletionResponse,
        ChatCompletionChunk,
        ChatMessage,
        ChatChoice,
        ChunkChoice,
        ChunkDelta,
        StreamOptions,
        Usage
    ))
)]
pub struct ChatApi;

/// Register chat-completion routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat/completions", post(chat_completions))
}

/// OpenAI chat completions (`POST /v1/chat/completions`).
///
/// With `stream: true` every backend increment is forwarded as its own SSE
/// frame the moment it arrives, followed by a finish frame and `data: [DONE]`.
/// Otherwise the full completion is returned as one JSON body.
#[utoipa::path(
    post,
    path = "/v1/chat/completions",
    tag = "chat",
    request_body = ChatCompletionRequest,
    responses(
        (status = 200, description = "Completion generated (JSON, or text/event-stream when streaming)", body = ChatCompletionResponse),
        (status = 400, description = "Malformed JSON or invalid request"),
        (status = 429, description = "Admission wait timed out"),
        (status = 502, description = "Backend failed to start or failed mid-stream"),
        (status = 500, description = "Internal error"),
    )
)]
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ServerError> {
    let started = Instant::now();
    state.metrics.requests_total.inc();

    let req: ChatCompletionRequest = serde_json::from_slice(&body)
        .map_err(|e| ServerError::BadRequest(format!("invalid JSON: {e}")))?;

    let params = translate(&req, state.config.sampling_defaults())?;
    let include_usage = req
        .stream_options
        .as_ref()
        .is_some_and(|o| o.include_usage);
    let meta = RequestMeta::new(req.model, params.max_tokens, word_count(&params.prompt))
        .with_usage_chunk(req.stream && include_usage);

    debug!(
        request_id = %meta.id,
        model = %meta.model,
        stream = req.stream,
        max_tokens = params.max_tokens,
        temperature = params.temperature,
        prompt_len = params.prompt.len(),
        "chat completion request"
    );

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let permit = admit(&state, &cancel).await?;
    debug!(request_id = %meta.id, in_flight = state.gate.in_flight(), "admitted");

    let increments = state
        .backend
        .open(params, cancel.clone())
        .await
        .map_err(ServerError::BackendUnavailable)?;

    if req.stream {
        let stream = StreamTask {
            meta,
            increments,
            permit,
            metrics: state.metrics.clone(),
            started,
        };
        return Ok(stream.spawn(guard, state.config.keep_alive_interval()));
    }

    let assembler = state.metrics.count_chunks(BufferedAssembler::new(meta));
    let response = assemble(increments, assembler).await?;
    drop(permit);
    guard.disarm();
    state
        .metrics
        .request_latency
        .observe(started.elapsed().as_secs_f64());

    info!(
        request_id = %response.id,
        completion_tokens = response.usage.completion_tokens,
        finish_reason = %response.choices[0].finish_reason,
        elapsed_ms = started.elapsed().as_millis(),
        "chat completion done"
    );
    Ok(Json(response).into_response())
}

/// Wait for a gate slot under a child of the request scope.
///
/// With an admission timeout configured, the child scope is cancelled when it
/// elapses and the wait ends as Rejected.
async fn admit(state: &AppState, request: &CancellationToken) -> Result<Permit, ServerError> {
    let scope = request.child_token();
    let acquire = state.gate.acquire(&scope);
    tokio::pin!(acquire);

    let permit = match state.config.admission_timeout {
        None => acquire.await,
        Some(limit) => tokio::select! {
            permit = &mut acquire => permit,
            () = tokio::time::sleep(limit) => {
                scope.cancel();
                acquire.await
            }
        },
    };

    permit.map_err(|e| {
        warn!(error = %e, capacity = state.gate.capacity(), "admission rejected");
        ServerError::from(e)
    })
}

/// Everything the streaming producer task takes ownership of.
struct StreamTask {
    meta: RequestMeta,
    increments: IncrementStream,
    /// Held until the stream ends, fails or is cancelled.
    permit: Permit,
    metrics: Metrics,
    started: Instant,
}

impl StreamTask {
    /// Spawn the producer and return the SSE body, which owns the drop guard.
    ///
    /// Keep-alive comments go out every `keep_alive` while the backend is
    /// silent, so a slow first token does not trip the idle timeout.
    fn spawn(self, guard: DropGuard, keep_alive: Duration) -> Response {
        let StreamTask {
            meta,
            increments,
            permit,
            metrics,
            started,
        } = self;
        let (tx, rx) = mpsc::channel::<Frame>(FRAME_BUFFER);
        let failures = tx.clone();
        let request_id = meta.id.clone();

        tokio::spawn(
            async move {
                let _permit = permit;
                let assembler = metrics.count_chunks(SseAssembler::new(meta, tx));
                match assemble(increments, assembler).await {
                    Ok(()) => {
                        metrics
                            .request_latency
                            .observe(started.elapsed().as_secs_f64());
                        info!(%request_id, "stream completed")
                    }
                    Err(AssembleError::ClientGone)
                    | Err(AssembleError::Stream(BackendError::Cancelled)) => {
                        info!(%request_id, "client disconnected; stream cancelled")
                    }
                    Err(e) => {
                        warn!(%request_id, error = %e, "stream aborted");
                        // Surfaces as a body error, which aborts the response.
                        let _ = failures.send(Err(e)).await;
                    }
                }
            }
            .instrument(Span::current()),
        );

        let frames = ReceiverStream::new(rx).map(move |frame| {
            let _scope = &guard;
            frame
        });

        let mut response = Sse::new(frames)
            .keep_alive(KeepAlive::new().interval(keep_alive))
            .into_response();
        response
            .headers_mut()
            .insert("x-accel-buffering", HeaderValue::from_static("no"));
        response
    }
}
