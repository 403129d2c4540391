//! OpenAI-compatible API v1 request / response types.
//!
//! The structures here are kept compatible with the OpenAI REST API so that
//! existing OpenAI SDK clients work without modification.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ── Request ──────────────────────────────────────────────────────────────────

/// A single message in the conversation history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    /// The role of the message author (`"system"`, `"user"`, `"assistant"`).
    /// Other roles are accepted and forwarded as unknown turns.
    #[serde(default)]
    pub role: String,
    /// The content of the message.
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Streaming options (`stream_options`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StreamOptions {
    /// Emit a trailing usage chunk before `[DONE]`.
    #[serde(default)]
    pub include_usage: bool,
}

/// Request body for `POST /v1/chat/completions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatCompletionRequest {
    /// Model identifier; echoed back, never validated.
    #[serde(default)]
    pub model: String,
    /// Conversation history, flattened into one prompt in order.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Legacy completion prompt. When non-blank it replaces `messages`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Maximum tokens to generate. Omitted or `0` uses the server default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature in [0, 2]. Omitted uses the server default;
    /// an explicit `0` requests greedy decoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Accepted for compatibility; not forwarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// When `true`, the response is streamed token-by-token using SSE.
    #[serde(default)]
    pub stream: bool,
    /// Streaming options; only `include_usage` is honoured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

// ── Buffered response ────────────────────────────────────────────────────────

/// Approximate token accounting (whitespace-delimited word counts).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A single choice in the completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatChoice {
    /// Zero-based index of this choice.
    pub index: u32,
    /// The generated message.
    pub message: ChatMessage,
    /// Why generation stopped (`"stop"` or `"length"`).
    pub finish_reason: String,
}

/// Response body for `POST /v1/chat/completions` with `stream: false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatCompletionResponse {
    /// Unique identifier for this completion.
    pub id: String,
    /// Always `"chat.completion"`.
    pub object: String,
    /// Unix timestamp of when the request was received.
    pub created: i64,
    /// Model named in the request.
    pub model: String,
    /// Generated choices (always exactly one).
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

// ── Streamed response ────────────────────────────────────────────────────────

/// Incremental message content carried by a chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChunkDelta {
    /// Set to `"assistant"` on the first chunk only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    /// `null` until the finish chunk.
    pub finish_reason: Option<String>,
}

/// One `data:` frame of a streamed completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatCompletionChunk {
    /// Shared by every chunk of one request.
    pub id: String,
    /// Always `"chat.completion.chunk"`.
    pub object: String,
    pub created: i64,
    pub model: String,
    /// One choice, or none for the trailing usage chunk.
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}
