//! Per-provider model-capability table.
//!
//! A `ProviderFactory` advertises a *provider-wide* capability set
//! (`supported_capabilities`), but not every model a provider serves
//! actually honors every one of those — reasoning models refuse
//! `temperature`/`top_p`, older chat models have no vision input, and
//! context windows vary by generation. This table is the per-model detail
//! underneath the provider-wide advertisement, driving two things: which
//! sampling parameters `build_chat_body`/`AnthropicProvider::build_request`
//! omit before they ever reach the wire, and which mismatches only produce
//! a `log::warn!` rather than a hard failure — gate on capability presence
//! and warn on mismatch rather than refuse.
//!
//! A prefix-matched table with a permissive default: an unmatched model
//! name falls through to a row that allows everything rather than
//! rejecting an unrecognized model outright.

use log::warn;
use serde_json::Value;

use crate::config::Config;

#[derive(Debug, Clone, Copy)]
pub struct ModelCapabilities {
    pub supports_reasoning: bool,
    pub supports_vision: bool,
    pub supports_tool_calling: bool,
    pub max_context_length: Option<u32>,
    pub disable_temperature: bool,
    pub disable_top_p: bool,
}

impl Default for ModelCapabilities {
    /// The permissive default handed back for any provider/model this table
    /// doesn't name: nothing gated off, no context cap asserted. A model
    /// this crate doesn't recognize is far more likely to be a new release
    /// than one that genuinely rejects `temperature`.
    fn default() -> Self {
        ModelCapabilities {
            supports_reasoning: false,
            supports_vision: false,
            supports_tool_calling: true,
            max_context_length: None,
            disable_temperature: false,
            disable_top_p: false,
        }
    }
}

struct Row {
    provider: &'static str,
    /// Matched against `Config::model` with `str::starts_with`, so a dated
    /// suffix (`-2024-08-06`) still matches the undated row below it.
    prefix: &'static str,
    capabilities: ModelCapabilities,
}

const TABLE: &[Row] = &[
    Row {
        provider: "openai",
        prefix: "o1",
        capabilities: ModelCapabilities {
            supports_reasoning: true,
            supports_vision: true,
            supports_tool_calling: true,
            max_context_length: Some(200_000),
            disable_temperature: true,
            disable_top_p: true,
        },
    },
    Row {
        provider: "openai",
        prefix: "o3",
        capabilities: ModelCapabilities {
            supports_reasoning: true,
            supports_vision: true,
            supports_tool_calling: true,
            max_context_length: Some(200_000),
            disable_temperature: true,
            disable_top_p: true,
        },
    },
    Row {
        provider: "openai",
        prefix: "gpt-4o",
        capabilities: ModelCapabilities {
            supports_vision: true,
            supports_tool_calling: true,
            max_context_length: Some(128_000),
            ..ModelCapabilities::DEFAULT
        },
    },
    Row {
        provider: "openai",
        prefix: "gpt-4-turbo",
        capabilities: ModelCapabilities {
            supports_vision: true,
            supports_tool_calling: true,
            max_context_length: Some(128_000),
            ..ModelCapabilities::DEFAULT
        },
    },
    Row {
        provider: "openai",
        prefix: "gpt-3.5",
        capabilities: ModelCapabilities {
            supports_tool_calling: true,
            max_context_length: Some(16_385),
            ..ModelCapabilities::DEFAULT
        },
    },
    Row {
        provider: "anthropic",
        prefix: "claude-3-7",
        capabilities: ModelCapabilities {
            supports_reasoning: true,
            supports_vision: true,
            supports_tool_calling: true,
            max_context_length: Some(200_000),
            ..ModelCapabilities::DEFAULT
        },
    },
    Row {
        provider: "anthropic",
        prefix: "claude-3-5",
        capabilities: ModelCapabilities {
            supports_vision: true,
            supports_tool_calling: true,
            max_context_length: Some(200_000),
            ..ModelCapabilities::DEFAULT
        },
    },
    Row {
        provider: "anthropic",
        prefix: "claude-3",
        capabilities: ModelCapabilities {
            supports_vision: true,
            supports_tool_calling: true,
            max_context_length: Some(200_000),
            ..ModelCapabilities::DEFAULT
        },
    },
    Row {
        provider: "google",
        prefix: "gemini-2",
        capabilities: ModelCapabilities {
            supports_reasoning: true,
            supports_vision: true,
            supports_tool_calling: true,
            max_context_length: Some(1_000_000),
            ..ModelCapabilities::DEFAULT
        },
    },
    Row {
        provider: "google",
        prefix: "gemini-1.5",
        capabilities: ModelCapabilities {
            supports_vision: true,
            supports_tool_calling: true,
            max_context_length: Some(1_000_000),
            ..ModelCapabilities::DEFAULT
        },
    },
    Row {
        provider: "deepseek",
        prefix: "deepseek-reasoner",
        capabilities: ModelCapabilities {
            supports_reasoning: true,
            supports_tool_calling: false,
            max_context_length: Some(64_000),
            disable_temperature: true,
            disable_top_p: true,
            ..ModelCapabilities::DEFAULT
        },
    },
    Row {
        provider: "deepseek",
        prefix: "deepseek-chat",
        capabilities: ModelCapabilities {
            supports_tool_calling: true,
            max_context_length: Some(64_000),
            ..ModelCapabilities::DEFAULT
        },
    },
    Row {
        provider: "xai",
        prefix: "grok",
        capabilities: ModelCapabilities {
            supports_vision: true,
            supports_tool_calling: true,
            max_context_length: Some(131_072),
            ..ModelCapabilities::DEFAULT
        },
    },
];

impl ModelCapabilities {
    /// A `const` copy of `Default::default()` usable in the table's struct-update syntax above.
    const DEFAULT: ModelCapabilities = ModelCapabilities {
        supports_reasoning: false,
        supports_vision: false,
        supports_tool_calling: true,
        max_context_length: None,
        disable_temperature: false,
        disable_top_p: false,
    };
}

/// Looks up the capability row for `provider`/`model`, preferring the
/// longest matching prefix so a more specific row (`"gpt-4o"`) wins over a
/// shorter one that would otherwise also match (`"gpt-4"`, were it present).
/// Falls back to the permissive default for anything this table doesn't
/// name.
pub fn lookup(provider: &str, model: &str) -> ModelCapabilities {
    TABLE
        .iter()
        .filter(|row| row.provider == provider && model.starts_with(row.prefix))
        .max_by_key(|row| row.prefix.len())
        .map(|row| row.capabilities)
        .unwrap_or_default()
}

/// Warns (never errors) when `config` asks for reasoning or
/// tool calling on a model the table doesn't list as supporting it. Called
/// once per request build, before the wire body is assembled.
pub fn warn_on_mismatch(provider: &str, config: &Config) {
    let capabilities = lookup(provider, &config.model);

    let reasoning_requested = config.extensions.get("reasoning").and_then(Value::as_bool).unwrap_or(false)
        || config.has_extension("reasoningEffort")
        || config.has_extension("thinkingBudgetTokens");
    if reasoning_requested && !capabilities.supports_reasoning {
        warn!(
            "reasoning requested for '{provider}' model '{}', but the capability table doesn't list this model as supporting it",
            config.model
        );
    }

    if config.tools.as_ref().is_some_and(|t| !t.is_empty()) && !capabilities.supports_tool_calling {
        warn!(
            "tools configured for '{provider}' model '{}', but the capability table doesn't list this model as supporting tool calling",
            config.model
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        let caps = lookup("openai", "gpt-4o-mini-2024-07-18");
        assert!(caps.supports_vision);
        assert_eq!(caps.max_context_length, Some(128_000));
    }

    #[test]
    fn reasoning_models_disable_sampling_params() {
        let caps = lookup("openai", "o1-preview");
        assert!(caps.disable_temperature);
        assert!(caps.disable_top_p);
        assert!(caps.supports_reasoning);
    }

    #[test]
    fn unknown_model_gets_permissive_default() {
        let caps = lookup("openai", "some-brand-new-model");
        assert!(!caps.disable_temperature);
        assert!(caps.supports_tool_calling);
        assert_eq!(caps.max_context_length, None);
    }

    #[test]
    fn reasoning_on_unsupported_model_only_warns_does_not_panic_or_error() {
        let config = Config::new("https://x", "gpt-3.5-turbo").with_extension("reasoning", true);
        warn_on_mismatch("openai", &config);
    }
}
