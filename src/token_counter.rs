//! Token counting fallback heuristic.
//!
//! Vendors that expose a dedicated counting endpoint (Anthropic's
//! `/v1/messages/count_tokens`) should be queried directly by the
//! provider's own `count_tokens` implementation; this module is the
//! shared fallback every provider can reach for when no such endpoint
//! exists, or when the caller prefers an estimate without an extra round
//! trip.

use crate::message::{Message, Part};
use crate::usage::Usage;

/// Coarse `ceil(totalChars/4)` estimate across every text part of every
/// message. Non-text parts (images, files, tool calls) are
/// not counted; a vendor's real tokenizer accounts for them very
/// differently and any constant here would just be noise.
pub fn estimate_tokens(messages: &[Message]) -> Usage {
    let total_chars: usize = messages
        .iter()
        .flat_map(|m| m.parts.iter())
        .filter_map(|p| match p {
            Part::Text(t) => Some(t.chars().count()),
            _ => None,
        })
        .sum();

    let estimated = total_chars.div_ceil(4) as u64;

    Usage {
        prompt_tokens: Some(estimated),
        completion_tokens: None,
        total_tokens: Some(estimated),
        reasoning_tokens: None,
    }
}

/// `tiktoken-rs`-backed estimate for OpenAI-family models, used when a
/// caller wants a tighter number than the coarse heuristic without
/// incurring a network round trip. Falls back to the coarse heuristic if
/// the requested encoding is unavailable.
pub fn estimate_tokens_tiktoken(messages: &[Message], model: &str) -> Usage {
    let Ok(bpe) = tiktoken_rs::get_bpe_from_model(model) else {
        return estimate_tokens(messages);
    };

    let total_tokens: usize = messages
        .iter()
        .flat_map(|m| m.parts.iter())
        .filter_map(|p| match p {
            Part::Text(t) => Some(bpe.encode_with_special_tokens(t).len()),
            _ => None,
        })
        .sum();

    Usage {
        prompt_tokens: Some(total_tokens as u64),
        completion_tokens: None,
        total_tokens: Some(total_tokens as u64),
        reasoning_tokens: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn estimate_rounds_up_to_nearest_whole_token() {
        let messages = vec![Message::user("abcde")]; // 5 chars -> ceil(5/4) = 2
        let usage = estimate_tokens(&messages);
        assert_eq!(usage.prompt_tokens, Some(2));
        assert_eq!(usage.total_tokens, Some(2));
    }

    #[test]
    fn empty_messages_estimate_to_zero() {
        let usage = estimate_tokens(&[]);
        assert_eq!(usage.prompt_tokens, Some(0));
    }
}
