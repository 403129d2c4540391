//! Response assembly over a backend increment stream.
//!
//! One receive loop ([`assemble`]) drives either strategy:
//! [`SseAssembler`] turns every increment into an SSE frame as soon as it
//! arrives, [`BufferedAssembler`] concatenates them into a single
//! [`ChatCompletionResponse`].

use async_trait::async_trait;
use axum::response::sse::Event;
use chrono::Utc;
use streamgate_core::{BackendError, IncrementStream, StreamItem};
use thiserror::Error;
use tokio::sync::mpsc;

use super::word_count;
use crate::schemas::v1::chat::{
    ChatChoice, ChatCompletionChunk, ChatCompletionResponse, ChatMessage, ChunkChoice, ChunkDelta,
    Usage,
};

pub const FINISH_STOP: &str = "stop";
pub const FINISH_LENGTH: &str = "length";
pub const DONE_SENTINEL: &str = "[DONE]";

/// One frame handed to the SSE body. An `Err` aborts the response.
pub type Frame = Result<Event, AssembleError>;

#[derive(Debug, Error)]
pub enum AssembleError {
    /// The backend stream failed or was cancelled.
    #[error(transparent)]
    Stream(BackendError),

    #[error("failed to encode response frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// The SSE body was dropped, so nobody reads further frames.
    #[error("client disconnected")]
    ClientGone,
}

/// Per-request values stamped on every chunk or response.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMeta {
    /// `chatcmpl-<unix nanos>`, generated once per request.
    pub id: String,
    pub created: i64,
    pub model: String,
    pub max_tokens: u32,
    pub prompt_tokens: usize,
    pub include_usage: bool,
}

impl RequestMeta {
    pub fn new(model: impl Into<String>, max_tokens: u32, prompt_tokens: usize) -> Self {
        let now = Utc::now();
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000));
        Self {
            id: format!("chatcmpl-{nanos}"),
            created: now.timestamp(),
            model: model.into(),
            max_tokens,
            prompt_tokens,
            include_usage: false,
        }
    }

    pub fn with_usage_chunk(mut self, include_usage: bool) -> Self {
        self.include_usage = include_usage;
        self
    }
}

/// `"length"` once the approximate completion count reaches `max_tokens`.
pub fn finish_reason(completion_tokens: usize, max_tokens: u32) -> &'static str {
    if max_tokens > 0 && completion_tokens >= max_tokens as usize {
        FINISH_LENGTH
    } else {
        FINISH_STOP
    }
}

/// A response-building strategy fed by [`assemble`].
#[async_trait]
pub trait Assembler: Send {
    type Output: Send;

    async fn increment(&mut self, text: String) -> Result<(), AssembleError>;

    async fn finish(self) -> Result<Self::Output, AssembleError>;
}

/// Read `increments` to the end, feeding each one to `assembler` in order.
pub async fn assemble<A: Assembler>(
    mut increments: IncrementStream,
    mut assembler: A,
) -> Result<A::Output, AssembleError> {
    loop {
        match increments.next().await {
            StreamItem::Increment(text) => assembler.increment(text).await?,
            StreamItem::EndOfStream => return assembler.finish().await,
            StreamItem::Failed(e) => return Err(AssembleError::Stream(e)),
        }
    }
}

// ── Streaming ────────────────────────────────────────────────────────────────

/// Emits one SSE frame per increment, then a finish frame and `[DONE]`.
pub struct SseAssembler {
    meta: RequestMeta,
    frames: mpsc::Sender<Frame>,
    first: bool,
    completion_tokens: usize,
}

impl SseAssembler {
    pub fn new(meta: RequestMeta, frames: mpsc::Sender<Frame>) -> Self {
        Self {
            meta,
            frames,
            first: true,
            completion_tokens: 0,
        }
    }

    fn chunk(&self, choices: Vec<ChunkChoice>, usage: Option<Usage>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.meta.id.clone(),
            object: "chat.completion.chunk".into(),
            created: self.meta.created,
            model: self.meta.model.clone(),
            choices,
            usage,
        }
    }

    async fn send_chunk(&self, chunk: &ChatCompletionChunk) -> Result<(), AssembleError> {
        let data = serde_json::to_string(chunk)?;
        self.send(Event::default().data(data)).await
    }

    async fn send(&self, event: Event) -> Result<(), AssembleError> {
        self.frames
            .send(Ok(event))
            .await
            .map_err(|_| AssembleError::ClientGone)
    }
}

#[async_trait]
impl Assembler for SseAssembler {
    type Output = ();

    async fn increment(&mut self, text: String) -> Result<(), AssembleError> {
        self.completion_tokens += word_count(&text);
        let role = std::mem::take(&mut self.first).then(|| "assistant".to_owned());
        let chunk = self.chunk(
            vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role,
                    content: Some(text),
                },
                finish_reason: None,
            }],
            None,
        );
        self.send_chunk(&chunk).await
    }

    async fn finish(self) -> Result<(), AssembleError> {
        let finish = self.chunk(
            vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta::default(),
                finish_reason: Some(FINISH_STOP.to_owned()),
            }],
            None,
        );
        self.send_chunk(&finish).await?;

        if self.meta.include_usage {
            let usage = Usage::new(self.meta.prompt_tokens, self.completion_tokens);
            let chunk = self.chunk(Vec::new(), Some(usage));
            self.send_chunk(&chunk).await?;
        }

        self.send(Event::default().data(DONE_SENTINEL)).await
    }
}

// ── Buffered ─────────────────────────────────────────────────────────────────

/// Concatenates every increment into one completion body.
pub struct BufferedAssembler {
    meta: RequestMeta,
    text: String,
    /// Sum of per-increment word counts, not a count over `text`: words
    /// split across increments are counted twice.
    completion_tokens: usize,
}

impl BufferedAssembler {
    pub fn new(meta: RequestMeta) -> Self {
        Self {
            meta,
            text: String::new(),
            completion_tokens: 0,
        }
    }
}

#[async_trait]
impl Assembler for BufferedAssembler {
    type Output = ChatCompletionResponse;

    async fn increment(&mut self, text: String) -> Result<(), AssembleError> {
        self.completion_tokens += word_count(&text);
        self.text.push_str(&text);
        Ok(())
    }

    async fn finish(self) -> Result<ChatCompletionResponse, AssembleError> {
        let reason = finish_reason(self.completion_tokens, self.meta.max_tokens);
        Ok(ChatCompletionResponse {
            id: self.meta.id,
            object: "chat.completion".into(),
            created: self.meta.created,
            model: self.meta.model,
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage::new("assistant", self.text),
                finish_reason: reason.to_owned(),
            }],
            usage: Usage::new(self.meta.prompt_tokens, self.completion_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;
    use axum::response::sse::Sse;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use streamgate_core::CancellationToken;
    use tokio_stream::wrappers::ReceiverStream;

    use super::*;

    fn increments(items: &[&str]) -> IncrementStream {
        let items: Vec<Result<String, BackendError>> =
            items.iter().map(|s| Ok((*s).to_owned())).collect();
        IncrementStream::new(futures::stream::iter(items), CancellationToken::new())
    }

    fn failing_after(items: &[&str]) -> IncrementStream {
        let mut items: Vec<Result<String, BackendError>> =
            items.iter().map(|s| Ok((*s).to_owned())).collect();
        items.push(Err(BackendError::Stream("worker reset".into())));
        IncrementStream::new(futures::stream::iter(items), CancellationToken::new())
    }

    fn meta(max_tokens: u32) -> RequestMeta {
        RequestMeta::new("local", max_tokens, 3)
    }

    /// Render queued frames exactly as the HTTP body would carry them.
    async fn render(rx: mpsc::Receiver<Frame>) -> Vec<String> {
        let body = Sse::new(ReceiverStream::new(rx))
            .into_response()
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes();
        String::from_utf8(body.to_vec())
            .unwrap()
            .split("\n\n")
            .filter(|frame| !frame.is_empty())
            .map(|frame| frame.strip_prefix("data: ").unwrap_or(frame).to_owned())
            .collect()
    }

    #[tokio::test]
    async fn streams_one_frame_per_increment_then_finish_and_done() {
        let (tx, rx) = mpsc::channel(16);
        assemble(increments(&["Hello", ", ", "world"]), SseAssembler::new(meta(256), tx))
            .await
            .unwrap();

        let frames = render(rx).await;
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[4], DONE_SENTINEL);

        let chunks: Vec<Value> = frames[..4]
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect();
        let contents: Vec<&str> = chunks[..3]
            .iter()
            .map(|c| c["choices"][0]["delta"]["content"].as_str().unwrap())
            .collect();
        assert_eq!(contents, vec!["Hello", ", ", "world"]);

        assert_eq!(chunks[0]["choices"][0]["delta"]["role"], "assistant");
        assert!(chunks[1]["choices"][0]["delta"].get("role").is_none());
        assert!(chunks[2]["choices"][0]["delta"].get("role").is_none());
        for chunk in &chunks[..3] {
            assert_eq!(chunk["choices"][0]["finish_reason"], Value::Null);
            assert_eq!(chunk["object"], "chat.completion.chunk");
        }

        assert_eq!(chunks[3]["choices"][0]["finish_reason"], FINISH_STOP);
        assert_eq!(chunks[3]["choices"][0]["delta"], serde_json::json!({}));

        let id = &chunks[0]["id"];
        assert!(id.as_str().unwrap().starts_with("chatcmpl-"));
        assert!(chunks.iter().all(|c| &c["id"] == id));
    }

    #[tokio::test]
    async fn usage_chunk_precedes_done_when_requested() {
        let (tx, rx) = mpsc::channel(16);
        let meta = meta(256).with_usage_chunk(true);
        assemble(increments(&["one ", "two "]), SseAssembler::new(meta, tx))
            .await
            .unwrap();

        let frames = render(rx).await;
        assert_eq!(frames.len(), 5);
        let usage: Value = serde_json::from_str(&frames[3]).unwrap();
        assert_eq!(usage["choices"], serde_json::json!([]));
        assert_eq!(usage["usage"]["completion_tokens"], 2);
        assert_eq!(usage["usage"]["prompt_tokens"], 3);
        assert_eq!(usage["usage"]["total_tokens"], 5);
        assert_eq!(frames[4], DONE_SENTINEL);
    }

    #[tokio::test]
    async fn mid_stream_failure_stops_without_finish_or_done() {
        let (tx, rx) = mpsc::channel(16);
        let err = assemble(failing_after(&["partial"]), SseAssembler::new(meta(256), tx))
            .await
            .unwrap_err();
        assert!(matches!(err, AssembleError::Stream(BackendError::Stream(_))));

        let frames = render(rx).await;
        assert_eq!(frames.len(), 1);
        assert!(!frames.iter().any(|f| f == DONE_SENTINEL));
    }

    #[tokio::test]
    async fn dropped_body_is_reported_as_client_gone() {
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let err = assemble(increments(&["lost"]), SseAssembler::new(meta(256), tx))
            .await
            .unwrap_err();
        assert!(matches!(err, AssembleError::ClientGone));
    }

    #[tokio::test]
    async fn buffered_concatenates_and_counts_per_increment() {
        let response = assemble(increments(&["one "; 5]), BufferedAssembler::new(meta(256)))
            .await
            .unwrap();

        assert_eq!(response.object, "chat.completion");
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.choices[0].message.role, "assistant");
        assert_eq!(response.choices[0].message.content, "one one one one one ");
        assert_eq!(response.usage, Usage::new(3, 5));
        assert_eq!(response.choices[0].finish_reason, FINISH_STOP);
    }

    #[tokio::test]
    async fn buffered_joins_fragments_in_arrival_order() {
        let response = assemble(
            increments(&["Hello", ", ", "world"]),
            BufferedAssembler::new(meta(256)),
        )
        .await
        .unwrap();
        assert_eq!(response.choices[0].message.content, "Hello, world");
    }

    #[tokio::test]
    async fn finish_reason_is_length_at_the_token_bound() {
        let words = ["alpha ", "beta ", "gamma "];

        let capped = assemble(increments(&words), BufferedAssembler::new(meta(3)))
            .await
            .unwrap();
        assert_eq!(capped.choices[0].finish_reason, FINISH_LENGTH);

        let roomy = assemble(increments(&words), BufferedAssembler::new(meta(100)))
            .await
            .unwrap();
        assert_eq!(roomy.choices[0].finish_reason, FINISH_STOP);
    }

    #[tokio::test]
    async fn buffered_failure_returns_no_partial_body() {
        let err = assemble(failing_after(&["half"]), BufferedAssembler::new(meta(256)))
            .await
            .unwrap_err();
        assert!(matches!(err, AssembleError::Stream(_)));
    }

    #[test]
    fn finish_reason_ignores_zero_bound() {
        assert_eq!(finish_reason(10, 0), FINISH_STOP);
        assert_eq!(finish_reason(2, 3), FINISH_STOP);
        assert_eq!(finish_reason(3, 3), FINISH_LENGTH);
    }
}
