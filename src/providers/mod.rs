//! Concrete vendor implementations.
//!
//! `anthropic` and `openai` carry a full native translator each; every
//! other OpenAI-shaped vendor rides `compat`'s shared body/response
//! handling via a `CompatFactory` in `vendors`. `elevenlabs` is the one
//! audio-only outlier, wired through the same `Provider`/`ProviderFactory`
//! seam with chat refused.

pub(crate) mod anthropic;
pub(crate) mod compat;
pub(crate) mod elevenlabs;
pub(crate) mod openai;
pub(crate) mod vendors;

use crate::provider::ProviderFactory;

/// Every provider the registry knows about out of the box.
/// Order doesn't matter: `Registry::ensure_initialized` inserts each into
/// a map keyed by provider id.
pub(crate) fn builtin_factories() -> Vec<Box<dyn ProviderFactory>> {
    vec![
        Box::new(anthropic::AnthropicFactory),
        Box::new(openai::OpenAiFactory),
        Box::new(elevenlabs::ElevenLabsFactory),
        vendors::deepseek_factory(),
        vendors::xai_factory(),
        vendors::groq_factory(),
        vendors::phind_factory(),
        vendors::openrouter_factory(),
        vendors::ollama_factory(),
        vendors::google_factory(),
    ]
}
