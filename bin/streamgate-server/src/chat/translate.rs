//! Converts an OpenAI-shaped chat request into backend generation parameters.

use streamgate_core::GenerateParams;
use thiserror::Error;

use crate::schemas::v1::chat::{ChatCompletionRequest, ChatMessage};

const MAX_TEMPERATURE: f32 = 2.0;

/// Fallbacks for sampling fields the client left out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingDefaults {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for SamplingDefaults {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            temperature: 0.7,
        }
    }
}

/// Client-side faults detected before any backend resource is used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("prompt/messages required")]
    EmptyPrompt,

    #[error("invalid temperature ({0}): must be between 0.0 and 2.0")]
    Temperature(f32),
}

/// Build the backend call for `req`.
///
/// `max_tokens` of `None` or `0` and `temperature` of `None` take the
/// configured defaults; an explicit `temperature: 0.0` is kept. The model
/// name, `top_p` and `stream_options` are not forwarded.
pub fn translate(
    req: &ChatCompletionRequest,
    defaults: SamplingDefaults,
) -> Result<GenerateParams, ValidationError> {
    let prompt = build_prompt(req).ok_or(ValidationError::EmptyPrompt)?;

    let max_tokens = req
        .max_tokens
        .filter(|&n| n > 0)
        .unwrap_or(defaults.max_tokens);

    let temperature = req.temperature.unwrap_or(defaults.temperature);
    if !temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
        return Err(ValidationError::Temperature(temperature));
    }

    Ok(GenerateParams {
        prompt,
        max_tokens,
        temperature,
    })
}

/// Flatten the request into the single prompt string the backend expects.
///
/// A non-blank legacy `prompt` wins over `messages`. Returns `None` when
/// neither yields a usable prompt.
pub fn build_prompt(req: &ChatCompletionRequest) -> Option<String> {
    if let Some(prompt) = req.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        return Some(prompt.to_owned());
    }
    if req.messages.is_empty() {
        return None;
    }

    let mut prompt = String::new();
    for message in &req.messages {
        push_turn(&mut prompt, message);
    }
    Some(prompt)
}

fn push_turn(prompt: &mut String, message: &ChatMessage) {
    let tag = match message.role.trim().to_lowercase().as_str() {
        "system" => "[SYSTEM] ",
        "user" => "[USER] ",
        "assistant" => "[ASSISTANT] ",
        _ => "[UNKNOWN] ",
    };
    prompt.push_str(tag);
    prompt.push_str(&message.content);
    prompt.push('\n');
}
