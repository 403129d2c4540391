//! Chat-completion pipeline: request translation and response assembly.

pub mod assemble;
pub mod translate;

/// Approximate token count: whitespace-delimited words.
///
/// Not tokenizer-accurate; usage figures built on it are estimates.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
