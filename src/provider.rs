//! Provider trait and factory abstraction.
//!
//! A `Provider` handle is the caller-facing entry point for a single
//! configured vendor connection; a `ProviderFactory` is what the registry
//! (`registry.rs`) stores and uses to validate a `Config` and produce one.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::capability::Capability;
use crate::config::Config;
use crate::error::Result;
use crate::message::{ChatResponse, Message, StreamEvent};
use crate::usage::Usage;

pub type ChatCompletionStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// A list of available models, as returned by a vendor's model-listing
/// endpoint.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub id: String,
    pub display_name: Option<String>,
    pub owned_by: Option<String>,
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> &'static str;

    async fn chat(&self, messages: Vec<Message>) -> Result<ChatResponse>;

    async fn chat_stream(&self, messages: Vec<Message>) -> Result<ChatCompletionStream>;

    /// Best-effort token count ahead of sending a request: vendor endpoint
    /// when the provider has one, else a coarse `ceil(totalChars/4)`
    /// heuristic.
    async fn count_tokens(&self, messages: &[Message]) -> Result<Usage>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Narrows to the audio capability surface when this provider's
    /// factory advertises a `TextToSpeech`/`SpeechToText`/
    /// `AudioTranslation` capability; `None` otherwise. A capability-gated
    /// downcast rather than a single monolithic trait, so a vendor that
    /// only supports TTS doesn't have to stub out STT.
    fn as_audio(&self) -> Option<&dyn crate::capabilities::audio::AudioCapable> {
        None
    }

    /// Narrows to the image-generation capability surface.
    fn as_images(&self) -> Option<&dyn crate::capabilities::images::ImageGeneration> {
        None
    }

    /// Narrows to the moderation capability surface.
    fn as_moderation(&self) -> Option<&dyn crate::capabilities::moderation::Moderation> {
        None
    }

    /// Narrows to the assistants capability surface.
    fn as_assistants(&self) -> Option<&dyn crate::capabilities::assistants::Assistants> {
        None
    }

    /// Narrows to the file-management capability surface.
    fn as_files(&self) -> Option<&dyn crate::capabilities::files::FileManagement> {
        None
    }

    /// Narrows to the embeddings capability surface.
    fn as_embeddings(&self) -> Option<&dyn crate::capabilities::embeddings::Embeddings> {
        None
    }
}

/// Declarative description of a provider, returned by
/// `ProviderFactory::info` and surfaced via
/// `Registry::get_all_provider_info`.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub supported_capabilities: Vec<Capability>,
}

pub trait ProviderFactory: Send + Sync {
    fn provider_id(&self) -> &'static str;

    fn supported_capabilities(&self) -> Vec<Capability>;

    fn display_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// A baseline config for this provider (base URL and a reasonable
    /// default model); callers typically layer their own key/overrides on
    /// top via `Config`'s builder methods.
    fn default_config(&self) -> Config;

    /// Whether `config` is acceptable for this provider (base URL set,
    /// required extensions well-formed, and so on). Does not perform I/O.
    fn validate_config(&self, config: &Config) -> bool;

    fn create(&self, config: Config) -> Result<Box<dyn Provider>>;

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: self.provider_id(),
            display_name: self.display_name(),
            description: self.description(),
            supported_capabilities: self.supported_capabilities(),
        }
    }
}
