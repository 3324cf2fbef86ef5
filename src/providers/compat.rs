//! OpenAI-compatible façade.
//!
//! Every vendor that speaks the `/v1/chat/completions` wire shape shares
//! one body/header builder (`providers::openai::build_chat_body` plus the
//! headers this module adds) and layers a small transform hook on top for
//! its own extensions (`extra_body`, custom headers, plugin params). One
//! translator reused, in spirit, across every compatible backend it
//! proxies.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{Value, json};

use crate::capability::Capability;
use crate::config::Config;
use crate::error::{LlmError, Result};
use crate::message::{ChatResponse, Message};
use crate::provider::{ChatCompletionStream, ModelInfo, Provider, ProviderFactory};
use crate::providers::openai::{build_chat_body, drive_openai_stream, parse_chat_response};
use crate::sse;
use crate::token_counter;
use crate::transport::{ReqwestTransport, Transport};
use crate::usage::Usage;

/// Per-provider request body transform hook.
pub trait RequestBodyTransformer: Send + Sync {
    fn transform(&self, body: Value, config: &Config) -> Value {
        let _ = config;
        body
    }
}

/// Per-provider header transform hook.
pub trait HeadersTransformer: Send + Sync {
    fn transform(&self, headers: Vec<(String, String)>, config: &Config) -> Vec<(String, String)> {
        let _ = config;
        headers
    }
}

pub struct NoopTransform;
impl RequestBodyTransformer for NoopTransform {}
impl HeadersTransformer for NoopTransform {}

/// A provider identity: id, display metadata, default base URL/model, and
/// the capability set this vendor advertises. Providers may advertise a
/// superset of what every model actually supports.
pub struct CompatSpec {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub default_base_url: &'static str,
    pub default_model: &'static str,
    pub capabilities: Vec<Capability>,
    pub auth_header: AuthHeader,
}

/// How the API key is carried. Most OpenAI-compatible vendors use a
/// bearer `Authorization` header; a few (Google's OpenAI-compatible
/// surface among them) accept it as a query parameter instead, but every
/// vendor in this crate's default registry uses bearer auth.
#[derive(Clone, Copy)]
pub enum AuthHeader {
    Bearer,
    ApiKeyHeader(&'static str),
}

pub struct CompatFactory<T: RequestBodyTransformer + HeadersTransformer + Default + 'static> {
    spec: CompatSpec,
    _marker: std::marker::PhantomData<T>,
}

impl<T: RequestBodyTransformer + HeadersTransformer + Default + 'static> CompatFactory<T> {
    pub fn new(spec: CompatSpec) -> Self {
        CompatFactory {
            spec,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: RequestBodyTransformer + HeadersTransformer + Default + 'static> ProviderFactory for CompatFactory<T> {
    fn provider_id(&self) -> &'static str {
        self.spec.id
    }

    fn supported_capabilities(&self) -> Vec<Capability> {
        self.spec.capabilities.clone()
    }

    fn display_name(&self) -> &'static str {
        self.spec.display_name
    }

    fn description(&self) -> &'static str {
        self.spec.description
    }

    fn default_config(&self) -> Config {
        Config::new(self.spec.default_base_url, self.spec.default_model)
    }

    fn validate_config(&self, config: &Config) -> bool {
        !config.base_url.is_empty() && !config.model.is_empty()
    }

    fn create(&self, config: Config) -> Result<Box<dyn Provider>> {
        Ok(Box::new(CompatProvider::<T>::new(
            self.spec.id,
            self.spec.auth_header,
            config,
        )?))
    }
}

pub(crate) struct CompatProvider<T> {
    id: &'static str,
    auth_header: AuthHeader,
    transport: Box<dyn Transport>,
    config: Config,
    transform: T,
}

impl<T: RequestBodyTransformer + HeadersTransformer + Default> CompatProvider<T> {
    fn new(id: &'static str, auth_header: AuthHeader, config: Config) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(config.base_url.clone(), config.timeout)?;
        Ok(CompatProvider {
            id,
            auth_header,
            transport: Box::new(transport),
            config,
            transform: T::default(),
        })
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        if let Some(key) = &self.config.api_key {
            match self.auth_header {
                AuthHeader::Bearer => headers.push(("authorization".to_string(), format!("Bearer {}", key.0.expose_secret()))),
                AuthHeader::ApiKeyHeader(name) => headers.push((name.to_string(), key.0.expose_secret().to_string())),
            }
        }
        let headers = self.transform.transform(headers, &self.config);
        crate::header_rules::apply(&self.config.header_rules, headers, &self.config)
    }

    fn body(&self, messages: &[Message], stream: bool) -> Result<Value> {
        let body = build_chat_body(self.id, &self.config, messages, stream)?;
        Ok(self.transform.transform(body, &self.config))
    }
}

#[async_trait]
impl<T: RequestBodyTransformer + HeadersTransformer + Send + Sync + 'static> Provider for CompatProvider<T> {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn chat(&self, messages: Vec<Message>) -> Result<ChatResponse> {
        let body = self.body(&messages, false)?;
        let value = self.transport.post_json("/chat/completions", &self.headers(), body).await?;
        parse_chat_response(value)
    }

    async fn chat_stream(&self, messages: Vec<Message>) -> Result<ChatCompletionStream> {
        let body = self.body(&messages, true)?;
        let bytes = self.transport.post_sse("/chat/completions", &self.headers(), body).await?;
        Ok(drive_openai_stream(sse::demultiplex(bytes)))
    }

    async fn count_tokens(&self, messages: &[Message]) -> Result<Usage> {
        Ok(token_counter::estimate_tokens_tiktoken(messages, &self.config.model))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let value = self.transport.get_json("/models", &self.headers()).await?;
        let data = value
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| LlmError::ResponseFormat {
                raw: "model list response missing 'data'".to_string(),
            })?;

        Ok(data
            .into_iter()
            .filter_map(|entry| entry.get("id").and_then(Value::as_str).map(str::to_string))
            .map(|id| ModelInfo {
                id,
                display_name: None,
                owned_by: Some(self.id.to_string()),
            })
            .collect())
    }
}

/// Google's OpenAI-compatible surface: reasoning/thinking config rides
/// in `extra_body.config.thinkingConfig` and a dedicated header signals
/// thought inclusion.
#[derive(Default)]
pub struct GoogleTransform;

impl RequestBodyTransformer for GoogleTransform {
    fn transform(&self, mut body: Value, config: &Config) -> Value {
        let reasoning = config.extensions.get("reasoning").and_then(Value::as_bool).unwrap_or(false);
        let include_thoughts = config.extensions.get("includeThoughts").and_then(Value::as_bool).unwrap_or(reasoning);
        let budget = config.extensions.get("thinkingBudgetTokens").and_then(Value::as_u64);
        let effort = config.extensions.get("reasoningEffort").and_then(Value::as_str);

        if reasoning || include_thoughts || budget.is_some() {
            let mut thinking_config = serde_json::Map::new();
            thinking_config.insert("includeThoughts".to_string(), json!(include_thoughts));
            if let Some(budget) = budget {
                thinking_config.insert("thinkingBudget".to_string(), json!(budget));
            }

            if let Value::Object(ref mut map) = body {
                let extra_body = map.entry("extra_body").or_insert_with(|| json!({}));
                if let Value::Object(ref mut extra) = extra_body {
                    let config_obj = extra.entry("config").or_insert_with(|| json!({}));
                    if let Value::Object(ref mut config_obj) = config_obj {
                        config_obj.insert("thinkingConfig".to_string(), Value::Object(thinking_config));
                    }
                    if let Some(effort) = effort {
                        extra.insert("reasoning_effort".to_string(), json!(effort));
                    }
                }
            }
        }
        body
    }
}

impl HeadersTransformer for GoogleTransform {
    fn transform(&self, mut headers: Vec<(String, String)>, config: &Config) -> Vec<(String, String)> {
        if config.extensions.get("reasoning").and_then(Value::as_bool) == Some(true) {
            headers.push(("X-Goog-Include-Thoughts".to_string(), "true".to_string()));
        }
        headers
    }
}

/// xAI's native web-search parameters, carried via a `webSearchConfig`
/// extension.
#[derive(Default)]
pub struct XaiTransform;

impl RequestBodyTransformer for XaiTransform {
    fn transform(&self, mut body: Value, config: &Config) -> Value {
        let Some(search) = config.extensions.get("webSearchConfig") else {
            return body;
        };
        if let Value::Object(ref mut map) = body {
            let mut search_params = serde_json::Map::new();
            for key in ["mode", "from_date", "to_date", "max_search_results", "excluded_websites", "max_uses"] {
                if let Some(value) = search.get(key) {
                    search_params.insert(key.to_string(), value.clone());
                }
            }
            if !search_params.is_empty() {
                map.insert("search_parameters".to_string(), Value::Object(search_params));
            }
        }
        body
    }
}

impl HeadersTransformer for XaiTransform {}

/// OpenRouter's plugin-based web search, via a `search_prompt` extension
/// or the `:online` model-name shortcut.
#[derive(Default)]
pub struct OpenRouterTransform;

impl RequestBodyTransformer for OpenRouterTransform {
    fn transform(&self, mut body: Value, config: &Config) -> Value {
        let web_search_enabled = config.extensions.get("webSearchEnabled").and_then(Value::as_bool).unwrap_or(false);
        let search_prompt = config.extensions.get("search_prompt").and_then(Value::as_str);

        if let Value::Object(ref mut map) = body {
            if web_search_enabled {
                if let Some(Value::String(model)) = map.get_mut("model") {
                    if !model.ends_with(":online") {
                        model.push_str(":online");
                    }
                }
            }
            if let Some(prompt) = search_prompt {
                let plugins = map.entry("plugins").or_insert_with(|| json!([]));
                if let Value::Array(ref mut list) = plugins {
                    list.push(json!({"id": "web", "search_prompt": prompt}));
                }
            }
        }
        body
    }
}

impl HeadersTransformer for OpenRouterTransform {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_transform_injects_thinking_config_and_header() {
        let config = Config::new("https://x", "gemini-1.5-pro")
            .with_extension("reasoning", true)
            .with_extension("thinkingBudgetTokens", 2048);

        let body = GoogleTransform.transform(json!({"model": "gemini-1.5-pro"}), &config);
        assert_eq!(
            body["extra_body"]["config"]["thinkingConfig"],
            json!({"includeThoughts": true, "thinkingBudget": 2048})
        );

        let headers = GoogleTransform.transform(vec![], &config);
        assert!(headers.contains(&("X-Goog-Include-Thoughts".to_string(), "true".to_string())));
    }

    #[test]
    fn google_transform_is_noop_without_reasoning_extensions() {
        let config = Config::new("https://x", "gemini-1.5-pro");
        let body = GoogleTransform.transform(json!({"model": "gemini-1.5-pro"}), &config);
        assert!(body.get("extra_body").is_none());
        assert!(GoogleTransform.transform(vec![], &config).is_empty());
    }

    #[test]
    fn google_transform_injects_reasoning_effort() {
        let config = Config::new("https://x", "gemini-1.5-pro").with_extension("reasoningEffort", "high");
        let body = GoogleTransform.transform(json!({"model": "gemini-1.5-pro"}), &config);
        // reasoning_effort alone, without reasoning/includeThoughts/budget, never
        // enters the `if` guard that builds extra_body in the first place.
        assert!(body.get("extra_body").is_none());

        let config = config.with_extension("reasoning", true);
        let body = GoogleTransform.transform(json!({"model": "gemini-1.5-pro"}), &config);
        assert_eq!(body["extra_body"]["reasoning_effort"], json!("high"));
    }

    #[test]
    fn xai_transform_carries_only_recognized_search_keys() {
        let config = Config::new("https://x", "grok-2-latest").with_extension(
            "webSearchConfig",
            json!({"mode": "on", "max_search_results": 5, "unknown_key": "ignored"}),
        );
        let body = XaiTransform.transform(json!({"model": "grok-2-latest"}), &config);
        assert_eq!(body["search_parameters"]["mode"], json!("on"));
        assert_eq!(body["search_parameters"]["max_search_results"], json!(5));
        assert!(body["search_parameters"].get("unknown_key").is_none());
    }

    #[test]
    fn xai_transform_is_noop_without_web_search_config() {
        let config = Config::new("https://x", "grok-2-latest");
        let body = XaiTransform.transform(json!({"model": "grok-2-latest"}), &config);
        assert!(body.get("search_parameters").is_none());
    }

    #[test]
    fn openrouter_transform_appends_online_shortcut() {
        let config = Config::new("https://x", "openrouter/auto").with_extension("webSearchEnabled", true);
        let body = OpenRouterTransform.transform(json!({"model": "openrouter/auto"}), &config);
        assert_eq!(body["model"], json!("openrouter/auto:online"));
    }

    #[test]
    fn openrouter_transform_does_not_double_append_online_suffix() {
        let config = Config::new("https://x", "openrouter/auto").with_extension("webSearchEnabled", true);
        let body = OpenRouterTransform.transform(json!({"model": "openrouter/auto:online"}), &config);
        assert_eq!(body["model"], json!("openrouter/auto:online"));
    }

    #[test]
    fn openrouter_transform_adds_search_prompt_plugin() {
        let config = Config::new("https://x", "openrouter/auto").with_extension("search_prompt", "find recent news");
        let body = OpenRouterTransform.transform(json!({"model": "openrouter/auto"}), &config);
        assert_eq!(body["plugins"][0]["id"], json!("web"));
        assert_eq!(body["plugins"][0]["search_prompt"], json!("find recent news"));
    }
}
