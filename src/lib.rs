//! A unified, polyglot client for OpenAI, Anthropic, Google Gemini, and
//! other LLM backends.
//!
//! The entry point is [`registry::registry()`]: look up or register a
//! [`provider::ProviderFactory`], then call
//! [`registry::Registry::create_provider`] with a [`config::Config`] to get
//! a [`provider::Provider`] handle. From there `chat`/`chat_stream` cover
//! the common path; capability-gated surfaces (audio, images, moderation,
//! assistants, file management) hang off `as_audio`/`as_images`/etc. and
//! return `None` for vendors that don't support them.

pub mod capabilities;
pub mod capability;
pub mod config;
pub mod error;
pub mod header_rules;
pub mod logging;
pub mod message;
pub mod model_capabilities;
pub mod provider;
pub mod registry;
pub mod sse;
pub mod token_counter;
pub mod tool;
pub mod tool_validation;
pub mod transport;
pub mod usage;

pub(crate) mod providers;

pub use config::Config;
pub use error::{LlmError, Result};
pub use message::{ChatResponse, Message, Role, StreamEvent};
pub use provider::{ModelInfo, Provider, ProviderFactory, ProviderInfo};
pub use registry::{ModelAliases, Registry, registry};
pub use tool::{Tool, ToolCall, ToolChoice};
