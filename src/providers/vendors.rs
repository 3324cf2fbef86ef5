//! Thin OpenAI-compatible vendor factories: each just supplies a
//! `CompatSpec` and, where the vendor needs one, a transform hook; all
//! request/response/stream handling is shared via `compat.rs`.

use crate::capability::Capability;
use crate::provider::ProviderFactory;
use crate::providers::compat::{AuthHeader, CompatFactory, CompatSpec, GoogleTransform, NoopTransform, OpenRouterTransform, XaiTransform};

pub(crate) fn deepseek_factory() -> Box<dyn ProviderFactory> {
    Box::new(CompatFactory::<NoopTransform>::new(CompatSpec {
        id: "deepseek",
        display_name: "DeepSeek",
        description: "DeepSeek models via its OpenAI-compatible API",
        default_base_url: "https://api.deepseek.com/v1",
        default_model: "deepseek-chat",
        capabilities: vec![Capability::Chat, Capability::Streaming, Capability::ToolCalling, Capability::Reasoning],
        auth_header: AuthHeader::Bearer,
    }))
}

pub(crate) fn xai_factory() -> Box<dyn ProviderFactory> {
    Box::new(CompatFactory::<XaiTransform>::new(CompatSpec {
        id: "xai",
        display_name: "xAI",
        description: "Grok models via xAI's OpenAI-compatible API, with native web search",
        default_base_url: "https://api.x.ai/v1",
        default_model: "grok-2-latest",
        capabilities: vec![
            Capability::Chat,
            Capability::Streaming,
            Capability::ToolCalling,
            Capability::Vision,
            Capability::LiveSearch,
        ],
        auth_header: AuthHeader::Bearer,
    }))
}

pub(crate) fn groq_factory() -> Box<dyn ProviderFactory> {
    Box::new(CompatFactory::<NoopTransform>::new(CompatSpec {
        id: "groq",
        display_name: "Groq",
        description: "Open models served at high throughput via Groq's OpenAI-compatible API",
        default_base_url: "https://api.groq.com/openai/v1",
        default_model: "llama-3.3-70b-versatile",
        capabilities: vec![Capability::Chat, Capability::Streaming, Capability::ToolCalling],
        auth_header: AuthHeader::Bearer,
    }))
}

pub(crate) fn phind_factory() -> Box<dyn ProviderFactory> {
    Box::new(CompatFactory::<NoopTransform>::new(CompatSpec {
        id: "phind",
        display_name: "Phind",
        description: "Developer-focused models via Phind's OpenAI-compatible API",
        default_base_url: "https://api.phind.com/v1",
        default_model: "Phind-70B",
        capabilities: vec![Capability::Chat, Capability::Streaming],
        auth_header: AuthHeader::Bearer,
    }))
}

pub(crate) fn openrouter_factory() -> Box<dyn ProviderFactory> {
    Box::new(CompatFactory::<OpenRouterTransform>::new(CompatSpec {
        id: "openrouter",
        display_name: "OpenRouter",
        description: "Unified routing across many vendors' models, OpenAI-compatible wire format",
        default_base_url: "https://openrouter.ai/api/v1",
        default_model: "openrouter/auto",
        capabilities: vec![
            Capability::Chat,
            Capability::Streaming,
            Capability::ToolCalling,
            Capability::Vision,
            Capability::LiveSearch,
        ],
        auth_header: AuthHeader::Bearer,
    }))
}

pub(crate) fn ollama_factory() -> Box<dyn ProviderFactory> {
    Box::new(CompatFactory::<NoopTransform>::new(CompatSpec {
        id: "ollama",
        display_name: "Ollama",
        description: "Locally-hosted models via Ollama's OpenAI-compatible API",
        default_base_url: "http://localhost:11434/v1",
        default_model: "llama3.1",
        capabilities: vec![Capability::Chat, Capability::Streaming, Capability::ToolCalling, Capability::ModelListing],
        auth_header: AuthHeader::Bearer,
    }))
}

pub(crate) fn google_factory() -> Box<dyn ProviderFactory> {
    Box::new(CompatFactory::<GoogleTransform>::new(CompatSpec {
        id: "google",
        display_name: "Google Gemini",
        description: "Gemini models via Google's OpenAI-compatible endpoint, with thinking-config support",
        default_base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        default_model: "gemini-1.5-pro",
        capabilities: vec![
            Capability::Chat,
            Capability::Streaming,
            Capability::ToolCalling,
            Capability::Reasoning,
            Capability::Vision,
        ],
        auth_header: AuthHeader::Bearer,
    }))
}
