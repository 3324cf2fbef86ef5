//! Unified configuration carrier.
//!
//! Typed common fields plus an open `extensions` map for provider-specific
//! options (`reasoning`, `thinkingBudgetTokens`, `webSearchConfig`, ...).
//! Unknown extensions are preserved verbatim through `copy_with`/JSON
//! round trips; a type mismatch on `get_extension` raises `InvalidRequest`
//! at the read site, never at construction.

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{LlmError, Result};
use crate::header_rules::HeaderRule;
use crate::tool::{Tool, ToolChoice};

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<SecretApiKey>,
    pub base_url: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<std::time::Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_tier: Option<String>,
    #[serde(default)]
    pub extensions: IndexMap<String, Value>,
    /// Header overrides applied on top of a provider's default headers,
    /// letting a caller inject or override a header without forking the
    /// provider.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header_rules: Vec<HeaderRule>,
}

/// Wraps `secrecy::SecretString` with the (de)serialization the crate needs
/// for `Config::to_json`/`from_json`, so a persisted config never prints
/// its key in plain text via `Debug` while still round-tripping through
/// JSON.
#[derive(Clone)]
pub struct SecretApiKey(pub SecretString);

impl Serialize for SecretApiKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use secrecy::ExposeSecret;
        serializer.serialize_str(self.0.expose_secret())
    }
}

impl<'de> Deserialize<'de> for SecretApiKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(SecretApiKey(SecretString::from(s)))
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Config {
            api_key: None,
            base_url: base_url.into(),
            model: model.into(),
            max_tokens: None,
            temperature: None,
            system_prompt: None,
            timeout: None,
            top_p: None,
            top_k: None,
            tools: None,
            tool_choice: None,
            stop_sequences: None,
            user: None,
            service_tier: None,
            extensions: IndexMap::new(),
            header_rules: Vec::new(),
        }
    }

    /// Appends a header rule, returning a new `Config`.
    pub fn with_header_rule(mut self, rule: HeaderRule) -> Self {
        self.header_rules.push(rule);
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretApiKey(SecretString::from(key.into())));
        self
    }

    /// Insert or overwrite a single extension key, returning a new `Config`.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.extensions.insert(key.into(), value);
        self
    }

    /// Merge a whole map of extensions in, existing keys overwritten.
    /// `c.withExtensions(e).getExtension(k) == e[k]` for every `k` in `e`.
    pub fn with_extensions(mut self, extra: IndexMap<String, Value>) -> Self {
        for (k, v) in extra {
            self.extensions.insert(k, v);
        }
        self
    }

    pub fn has_extension(&self, key: &str) -> bool {
        self.extensions.contains_key(key)
    }

    /// Typed read of an extension value. A type mismatch raises
    /// `InvalidRequest` here, at the read site — never at construction.
    pub fn get_extension<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.extensions.get(key) {
            None => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| LlmError::InvalidRequest(format!("extension '{key}' has unexpected shape: {e}"))),
        }
    }

    /// Produce a modified copy with a different model id, leaving every
    /// other field untouched.
    pub fn copy_with_model(&self, model: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.model = model.into();
        copy
    }

    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| LlmError::JsonParse(e.to_string()))
    }

    pub fn from_json(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| LlmError::JsonParse(e.to_string()))
    }
}

impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        use secrecy::ExposeSecret;

        let keys_match = self.api_key.as_ref().map(|k| k.0.expose_secret().to_string())
            == other.api_key.as_ref().map(|k| k.0.expose_secret().to_string());

        keys_match
            && self.base_url == other.base_url
            && self.model == other.model
            && self.max_tokens == other.max_tokens
            && self.temperature == other.temperature
            && self.system_prompt == other.system_prompt
            && self.top_p == other.top_p
            && self.top_k == other.top_k
            && self.tools == other.tools
            && self.tool_choice == other.tool_choice
            && self.stop_sequences == other.stop_sequences
            && self.user == other.user
            && self.service_tier == other.service_tier
            && self.extensions == other.extensions
            && self.header_rules == other.header_rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_extensions_round_trips_every_key() {
        let mut extra = IndexMap::new();
        extra.insert("reasoning".to_string(), Value::Bool(true));
        extra.insert("thinkingBudgetTokens".to_string(), Value::from(2048));

        let cfg = Config::new("https://api.example.com", "model-x").with_extensions(extra.clone());

        for (k, v) in &extra {
            assert_eq!(cfg.extensions.get(k), Some(v));
        }
    }

    #[test]
    fn typed_read_mismatch_is_invalid_request_not_panic() {
        let cfg = Config::new("https://api.example.com", "model-x").with_extension("reasoning", "not-a-bool");

        let result: Result<Option<bool>> = cfg.get_extension("reasoning");
        assert!(matches!(result, Err(LlmError::InvalidRequest(_))));
    }

    #[test]
    fn structural_equality_includes_extensions() {
        let a = Config::new("https://x", "m").with_extension("k", 1);
        let b = Config::new("https://x", "m").with_extension("k", 1);
        let c = Config::new("https://x", "m").with_extension("k", 2);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn to_json_from_json_round_trips_tool_choice() {
        let mut cfg = Config::new("https://api.example.com", "model-x");
        cfg.tool_choice = Some(crate::tool::ToolChoice::specific("lookup_weather"));

        let round_tripped = Config::from_json(cfg.to_json().unwrap()).unwrap();

        assert_eq!(round_tripped.tool_choice, cfg.tool_choice);
    }

    #[test]
    fn to_json_from_json_round_trips_none_tool_choice() {
        let cfg = Config::new("https://api.example.com", "model-x");

        let round_tripped = Config::from_json(cfg.to_json().unwrap()).unwrap();

        assert_eq!(round_tripped.tool_choice, cfg.tool_choice);
    }
}
