//! ElevenLabs provider: audio-only vendor, wired into the same
//! `Provider`/`ProviderFactory` seam as every chat vendor so the registry
//! treats it uniformly, but `chat`/`chat_stream` are refused — this
//! vendor has no text-generation surface.
//!
//! Wire shapes follow ElevenLabs's own API (`/v1/text-to-speech/{voice_id}`,
//! the `xi-api-key` header, `voice_settings.{stability,similarity_boost}`).

use std::collections::HashSet;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;

use crate::capabilities::audio::{self, AudioCapable, AudioFeature, SttRequest, SttResponse, TtsRequest, TtsResponse};
use crate::capability::Capability;
use crate::config::Config;
use crate::error::{LlmError, Result};
use crate::message::{ChatResponse, Message};
use crate::provider::{ChatCompletionStream, ModelInfo, Provider, ProviderFactory};
use crate::transport::{FormPart, ReqwestTransport, Transport};
use crate::usage::Usage;

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io/v1";

pub(crate) struct ElevenLabsFactory;

impl ProviderFactory for ElevenLabsFactory {
    fn provider_id(&self) -> &'static str {
        "elevenlabs"
    }

    fn supported_capabilities(&self) -> Vec<Capability> {
        vec![Capability::TextToSpeech, Capability::SpeechToText, Capability::ModelListing]
    }

    fn display_name(&self) -> &'static str {
        "ElevenLabs"
    }

    fn description(&self) -> &'static str {
        "Text-to-speech and speech-to-text via the ElevenLabs API"
    }

    fn default_config(&self) -> Config {
        Config::new(DEFAULT_BASE_URL, "eleven_multilingual_v2")
    }

    fn validate_config(&self, config: &Config) -> bool {
        !config.base_url.is_empty()
    }

    fn create(&self, config: Config) -> Result<Box<dyn Provider>> {
        Ok(Box::new(ElevenLabsProvider::new(config)?))
    }
}

pub(crate) struct ElevenLabsProvider {
    transport: Box<dyn Transport>,
    config: Config,
}

impl ElevenLabsProvider {
    fn new(config: Config) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(config.base_url.clone(), config.timeout)?;
        Ok(ElevenLabsProvider {
            transport: Box::new(transport),
            config,
        })
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        if let Some(key) = &self.config.api_key {
            headers.push(("xi-api-key".to_string(), key.0.expose_secret().to_string()));
        }
        crate::header_rules::apply(&self.config.header_rules, headers, &self.config)
    }
}

#[async_trait]
impl Provider for ElevenLabsProvider {
    fn id(&self) -> &'static str {
        "elevenlabs"
    }

    async fn chat(&self, _messages: Vec<Message>) -> Result<ChatResponse> {
        Err(LlmError::InvalidRequest("elevenlabs does not support chat; use as_audio()".to_string()))
    }

    async fn chat_stream(&self, _messages: Vec<Message>) -> Result<ChatCompletionStream> {
        Err(LlmError::InvalidRequest("elevenlabs does not support chat; use as_audio()".to_string()))
    }

    async fn count_tokens(&self, _messages: &[Message]) -> Result<Usage> {
        Ok(Usage::default())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        #[derive(Deserialize)]
        struct ModelEntry {
            model_id: String,
            name: Option<String>,
        }

        let value = self.transport.get_json("/models", &self.headers()).await?;
        let entries: Vec<ModelEntry> = serde_json::from_value(value).map_err(|e| LlmError::JsonParse(e.to_string()))?;
        Ok(entries
            .into_iter()
            .map(|m| ModelInfo {
                id: m.model_id,
                display_name: m.name,
                owned_by: Some("elevenlabs".to_string()),
            })
            .collect())
    }

    fn as_audio(&self) -> Option<&dyn AudioCapable> {
        Some(self)
    }
}

#[async_trait]
impl AudioCapable for ElevenLabsProvider {
    fn supported_features(&self) -> HashSet<AudioFeature> {
        HashSet::from([AudioFeature::TextToSpeech, AudioFeature::SpeechToText])
    }

    async fn text_to_speech(&self, request: TtsRequest) -> Result<TtsResponse> {
        audio::require(&self.supported_features(), AudioFeature::TextToSpeech)?;

        let mut voice_settings = serde_json::Map::new();
        if let Some(stability) = request.stability {
            voice_settings.insert("stability".to_string(), json!(stability));
        }
        if let Some(similarity) = request.similarity_boost {
            voice_settings.insert("similarity_boost".to_string(), json!(similarity));
        }

        let mut body = serde_json::Map::new();
        body.insert("text".to_string(), json!(request.text));
        body.insert("model_id".to_string(), json!(request.model.unwrap_or_else(|| self.config.model.clone())));
        if !voice_settings.is_empty() {
            body.insert("voice_settings".to_string(), serde_json::Value::Object(voice_settings));
        }

        let path = format!("/text-to-speech/{}", request.voice_id);
        let audio_bytes = self.transport.post_json_bytes(&path, &self.headers(), serde_json::Value::Object(body)).await?;

        Ok(TtsResponse {
            audio: audio_bytes,
            mime_type: request.output_format.unwrap_or_else(|| "audio/mpeg".to_string()),
            alignment: None,
        })
    }

    async fn speech_to_text(&self, request: SttRequest) -> Result<SttResponse> {
        audio::require(&self.supported_features(), AudioFeature::SpeechToText)?;

        let mut parts = vec![FormPart::File {
            name: "file".to_string(),
            filename: "audio".to_string(),
            mime: request.mime_type,
            bytes: request.audio,
        }];
        parts.push(FormPart::Text {
            name: "model_id".to_string(),
            value: request.model.unwrap_or_else(|| "scribe_v1".to_string()),
        });
        if let Some(language) = request.language {
            parts.push(FormPart::Text {
                name: "language_code".to_string(),
                value: language,
            });
        }

        let value = self.transport.post_form("/speech-to-text", &self.headers(), parts).await?;

        #[derive(Deserialize)]
        struct SttResponseBody {
            text: String,
            #[serde(default)]
            language_code: Option<String>,
        }
        let parsed: SttResponseBody = serde_json::from_value(value).map_err(|e| LlmError::JsonParse(e.to_string()))?;

        Ok(SttResponse {
            text: parsed.text,
            language: parsed.language_code,
            duration_seconds: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chat_is_refused() {
        let provider = ElevenLabsProvider::new(Config::new(DEFAULT_BASE_URL, "eleven_multilingual_v2")).unwrap();
        let err = provider.chat(vec![Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }

    #[test]
    fn as_audio_is_populated() {
        let provider = ElevenLabsProvider::new(Config::new(DEFAULT_BASE_URL, "eleven_multilingual_v2")).unwrap();
        assert!(provider.as_audio().is_some());
    }
}
