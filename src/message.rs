//! Protocol-agnostic message model.
//!
//! `Message`/`Part` are the shared internal representation every vendor
//! translator converts to and from: a plain value type with no wire
//! protocol baked in, so the same conversation can be replayed against
//! any provider.

use serde::{Deserialize, Serialize};

use crate::tool::ToolCall;
use crate::usage::Usage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single conversation turn: a role plus an ordered sequence of parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
            name: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            parts: vec![Part::Text(text.into())],
            name: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            parts: vec![Part::Text(text.into())],
            name: None,
        }
    }

    /// Concatenation of every `Text` part, in order, or `None` if there are
    /// none.
    pub fn text(&self) -> Option<String> {
        let joined: Vec<&str> = self
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();

        if joined.is_empty() {
            None
        } else {
            Some(joined.join("\n"))
        }
    }

    /// Whether this message carries no meaningful content at all. A chat
    /// request is rejected if any message content is effectively empty.
    pub fn is_effectively_empty(&self) -> bool {
        self.parts.iter().all(|p| match p {
            Part::Text(t) => t.trim().is_empty(),
            _ => false,
        })
    }

    pub fn tool_uses(&self) -> Vec<&ToolCall> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolUse(calls) => Some(calls.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMime {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageMime {
    pub fn as_mime_type(&self) -> &'static str {
        match self {
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Png => "image/png",
            ImageMime::Gif => "image/gif",
            ImageMime::Webp => "image/webp",
        }
    }
}

/// A single content part within a message. Unsupported kinds are never
/// silently dropped by a translator; the translator substitutes an
/// explanatory `Text` part instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Part {
    Text(String),
    Image { mime: ImageMime, bytes: Vec<u8> },
    ImageUrl(String),
    /// Non-PDF mime types become a textual note when sent to providers that
    /// only accept PDF file parts (Anthropic, notably).
    File { mime: String, bytes: Vec<u8> },
    ToolUse(Vec<ToolCall>),
    ToolResult(Vec<ToolResultItem>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultItem {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}

/// The full result of a non-streaming chat call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub model: String,
    pub message: Message,
    /// Concatenation of all text blocks in the response, newline-joined;
    /// `None` if the response has no text content.
    pub text: Option<String>,
    /// Concatenation of `thinking` blocks; a redacted thinking block
    /// contributes the fixed sentinel string.
    pub thinking: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
}

/// The fixed sentinel substituted for a redacted-thinking content block.
pub const REDACTED_THINKING_SENTINEL: &str = "[Redacted thinking content - encrypted for safety]";

/// A single event in a chat stream. Every stream terminates with
/// exactly one `Completion` or one `Error`, and no event follows either
/// (tested in `sse.rs`/provider stream tests).
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextDelta(String),
    ThinkingDelta(String),
    ToolCallDelta(ToolCall),
    Completion(Box<ChatResponse>),
    Error(crate::error::LlmError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_concatenates_in_order() {
        let msg = Message {
            role: Role::Assistant,
            parts: vec![Part::Text("hello ".into()), Part::Text("world".into())],
            name: None,
        };
        assert_eq!(msg.text().as_deref(), Some("hello \nworld"));
    }

    #[test]
    fn empty_whitespace_message_is_effectively_empty() {
        let msg = Message {
            role: Role::User,
            parts: vec![Part::Text("   \n".into())],
            name: None,
        };
        assert!(msg.is_effectively_empty());
    }

    #[test]
    fn non_text_part_is_not_effectively_empty() {
        let msg = Message {
            role: Role::User,
            parts: vec![Part::ImageUrl("https://x/y.png".into())],
            name: None,
        };
        assert!(!msg.is_effectively_empty());
    }
}
