//! Advertised provider capabilities.
//!
//! A capability is a feature a provider *advertises*; providers may
//! advertise a superset of what every one of their models actually
//! supports, so callers should gate on capability presence and treat a
//! model-specific mismatch as a warning rather than a hard failure.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Chat,
    Streaming,
    Embedding,
    TextToSpeech,
    StreamingTextToSpeech,
    SpeechToText,
    AudioTranslation,
    RealtimeAudio,
    ModelListing,
    ToolCalling,
    Reasoning,
    Vision,
    Completion,
    ImageGeneration,
    FileManagement,
    Moderation,
    Assistants,
    LiveSearch,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Capability::Chat => "chat",
            Capability::Streaming => "streaming",
            Capability::Embedding => "embedding",
            Capability::TextToSpeech => "text_to_speech",
            Capability::StreamingTextToSpeech => "streaming_text_to_speech",
            Capability::SpeechToText => "speech_to_text",
            Capability::AudioTranslation => "audio_translation",
            Capability::RealtimeAudio => "realtime_audio",
            Capability::ModelListing => "model_listing",
            Capability::ToolCalling => "tool_calling",
            Capability::Reasoning => "reasoning",
            Capability::Vision => "vision",
            Capability::Completion => "completion",
            Capability::ImageGeneration => "image_generation",
            Capability::FileManagement => "file_management",
            Capability::Moderation => "moderation",
            Capability::Assistants => "assistants",
            Capability::LiveSearch => "live_search",
        };
        f.write_str(s)
    }
}
