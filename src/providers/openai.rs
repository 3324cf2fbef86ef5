//! OpenAI Chat Completions translator and provider factory. Also backs
//! every OpenAI-compatible vendor via `compat.rs`, which reuses the
//! body/response shapes defined here and layers provider-specific
//! transform hooks on top.

use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use log::warn;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::capability::Capability;
use crate::config::Config;
use crate::error::{LlmError, Result};
use crate::message::{ChatResponse, FinishReason, Message, Part, Role, StreamEvent};
use crate::provider::{ChatCompletionStream, ModelInfo, Provider, ProviderFactory};
use crate::sse::{self, SseEvent};
use crate::tool::{FunctionCall, ToolCall, ToolChoice};
use crate::token_counter;
use crate::transport::{ReqwestTransport, Transport};
use crate::usage::Usage;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub(crate) struct OpenAiFactory;

impl ProviderFactory for OpenAiFactory {
    fn provider_id(&self) -> &'static str {
        "openai"
    }

    fn supported_capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::Chat,
            Capability::Streaming,
            Capability::ToolCalling,
            Capability::Reasoning,
            Capability::Vision,
            Capability::ModelListing,
            Capability::FileManagement,
            Capability::ImageGeneration,
            Capability::Moderation,
            Capability::Assistants,
            Capability::Embedding,
            Capability::TextToSpeech,
            Capability::SpeechToText,
            Capability::AudioTranslation,
        ]
    }

    fn display_name(&self) -> &'static str {
        "OpenAI"
    }

    fn description(&self) -> &'static str {
        "GPT models via the OpenAI Chat Completions API"
    }

    fn default_config(&self) -> Config {
        Config::new(DEFAULT_BASE_URL, "gpt-4o-mini")
    }

    fn validate_config(&self, config: &Config) -> bool {
        !config.base_url.is_empty() && !config.model.is_empty()
    }

    fn create(&self, config: Config) -> Result<Box<dyn Provider>> {
        Ok(Box::new(OpenAiProvider::new(config)?))
    }
}

pub(crate) struct OpenAiProvider {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) config: Config,
}

impl OpenAiProvider {
    fn new(config: Config) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(config.base_url.clone(), config.timeout)?;
        Ok(OpenAiProvider {
            transport: Box::new(transport),
            config,
        })
    }

    pub(crate) fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        if let Some(key) = &self.config.api_key {
            headers.push(("authorization".to_string(), format!("Bearer {}", key.0.expose_secret())));
        }
        crate::header_rules::apply(&self.config.header_rules, headers, &self.config)
    }
}

/// Builds an OpenAI Chat Completions request body from the common `Config`
/// plus message list. Shared by the native OpenAI provider and every
/// OpenAI-compatible vendor (`compat.rs` layers a transform hook on top).
/// `provider_id` selects the row of the model-capability table used to
/// gate `temperature`/`top_p` and warn on reasoning/tool-calling
/// mismatches before the wire body is assembled.
pub(crate) fn build_chat_body(provider_id: &str, config: &Config, messages: &[Message], stream: bool) -> Result<Value> {
    crate::model_capabilities::warn_on_mismatch(provider_id, config);
    let capabilities = crate::model_capabilities::lookup(provider_id, &config.model);

    let mut vendor_messages = Vec::new();

    if let Some(system) = &config.system_prompt {
        vendor_messages.push(json!({"role": "system", "content": system}));
    }

    for message in messages {
        if message.is_effectively_empty() && message.tool_uses().is_empty() {
            return Err(LlmError::InvalidRequest("message content must not be empty".to_string()));
        }
        vendor_messages.extend(message_to_json(message));
    }

    if vendor_messages.is_empty() {
        return Err(LlmError::InvalidRequest("at least one message is required".to_string()));
    }

    let mut body = serde_json::Map::new();
    body.insert("model".to_string(), json!(config.model));
    body.insert("messages".to_string(), Value::Array(vendor_messages));
    body.insert("stream".to_string(), json!(stream));

    if let Some(max_tokens) = config.max_tokens {
        body.insert("max_tokens".to_string(), json!(max_tokens));
    }
    if let Some(temperature) = config.temperature {
        if capabilities.disable_temperature {
            warn!("model '{}' does not accept 'temperature'; omitting it from the request", config.model);
        } else {
            if !(0.0..=1.0).contains(&temperature) {
                warn!("temperature {temperature} is outside the conventional [0,1] range; forwarding anyway");
            }
            body.insert("temperature".to_string(), json!(temperature));
        }
    }
    if let Some(top_p) = config.top_p {
        if capabilities.disable_top_p {
            warn!("model '{}' does not accept 'top_p'; omitting it from the request", config.model);
        } else {
            body.insert("top_p".to_string(), json!(top_p));
        }
    }
    if let Some(stop) = &config.stop_sequences {
        body.insert("stop".to_string(), json!(stop));
    }
    if let Some(user) = &config.user {
        body.insert("user".to_string(), json!(user));
    }
    if let Some(tier) = &config.service_tier {
        body.insert("service_tier".to_string(), json!(tier));
    }
    if let Some(tools) = &config.tools {
        let converted: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.function.name,
                        "description": t.function.description,
                        "parameters": t.function.parameters,
                    }
                })
            })
            .collect();
        body.insert("tools".to_string(), Value::Array(converted));
    }
    if let Some(choice) = &config.tool_choice {
        body.insert("tool_choice".to_string(), tool_choice_to_json(choice));
    }

    Ok(Value::Object(body))
}

fn tool_choice_to_json(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto { .. } => json!("auto"),
        ToolChoice::Any { .. } => json!("required"),
        ToolChoice::Specific { name, .. } => json!({"type": "function", "function": {"name": name}}),
        ToolChoice::None => json!("none"),
    }
}

/// Converts one `Message` into one or more OpenAI wire messages. OpenAI has
/// one `tool` message per tool result rather than a batched list, so a
/// `Message` carrying N parallel `ToolResult` items expands into N wire
/// messages here.
fn message_to_json(message: &Message) -> Vec<Value> {
    let tool_results: Vec<Value> = message
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::ToolResult(items) => Some(items),
            _ => None,
        })
        .flatten()
        .map(|item| json!({"role": "tool", "tool_call_id": item.tool_call_id, "content": item.content}))
        .collect();

    if !tool_results.is_empty() {
        return tool_results;
    }

    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    };

    let tool_calls: Vec<Value> = message
        .tool_uses()
        .into_iter()
        .map(|call| {
            json!({
                "id": call.id,
                "type": "function",
                "function": {"name": call.function.name, "arguments": call.function.arguments},
            })
        })
        .collect();

    if !tool_calls.is_empty() {
        let text_segments: Vec<&str> = message
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        let content = if text_segments.is_empty() {
            Value::Null
        } else {
            json!(text_segments.join("\n"))
        };
        return vec![json!({"role": role, "content": content, "tool_calls": tool_calls})];
    }

    let content_items: Vec<Value> = message
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Text(t) => Some(json!({"type": "text", "text": t})),
            Part::Image { mime, bytes } => Some(json!({
                "type": "image_url",
                "image_url": {"url": format!("data:{};base64,{}", mime.as_mime_type(), base64::engine::general_purpose::STANDARD.encode(bytes))}
            })),
            Part::ImageUrl(url) => Some(json!({"type": "image_url", "image_url": {"url": url}})),
            Part::File { mime, .. } => Some(json!({"type": "text", "text": format!("[File of type '{mime}' omitted]")})),
            _ => None,
        })
        .collect();

    if content_items.len() == 1 {
        if let Some(text) = content_items[0].get("text") {
            return vec![json!({"role": role, "content": text})];
        }
    }

    vec![json!({"role": role, "content": content_items})]
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
    #[serde(default)]
    total_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens_details: Option<OpenAiCompletionTokenDetails>,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
struct OpenAiCompletionTokenDetails {
    #[serde(default)]
    reasoning_tokens: Option<u64>,
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        other => {
            warn!("unrecognized OpenAI finish_reason '{other}'; treating as a stop");
            FinishReason::Stop
        }
    }
}

pub(crate) fn parse_chat_response(response: Value) -> Result<ChatResponse> {
    let parsed: OpenAiChatResponse = serde_json::from_value(response).map_err(|e| LlmError::JsonParse(e.to_string()))?;
    let Some(choice) = parsed.choices.into_iter().next() else {
        return Err(LlmError::ResponseFormat {
            raw: "response carried no choices".to_string(),
        });
    };

    let tool_calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|c| ToolCall {
            id: c.id,
            kind: "function".to_string(),
            function: FunctionCall {
                name: c.function.name,
                arguments: c.function.arguments,
            },
        })
        .collect();

    let mut parts = Vec::new();
    if let Some(text) = &choice.message.content {
        parts.push(Part::Text(text.clone()));
    }
    if !tool_calls.is_empty() {
        parts.push(Part::ToolUse(tool_calls.clone()));
    }

    let usage = parsed.usage.unwrap_or_default();

    Ok(ChatResponse {
        id: parsed.id,
        model: parsed.model,
        message: Message {
            role: Role::Assistant,
            parts,
            name: None,
        },
        text: choice.message.content,
        thinking: None,
        tool_calls,
        usage: Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            reasoning_tokens: usage.completion_tokens_details.and_then(|d| d.reasoning_tokens),
        },
        finish_reason: choice.finish_reason.as_deref().map(map_finish_reason),
    })
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiStreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamToolCall {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<OpenAiStreamFunctionDelta>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAiStreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Simpler than Anthropic's: concatenate `delta.content` as text deltas and
/// accumulate `delta.tool_calls[*]` by index, emitting each complete call
/// once `finish_reason` closes the turn.
#[derive(Default)]
struct OpenAiStreamState {
    id: String,
    model: String,
    text: String,
    tool_calls: std::collections::BTreeMap<usize, PendingToolCall>,
    finish_reason: Option<String>,
    usage: Option<OpenAiUsage>,
}

impl OpenAiStreamState {
    fn completion(&self) -> ChatResponse {
        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .values()
            .map(|p| ToolCall {
                id: p.id.clone(),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: p.name.clone(),
                    arguments: p.arguments.clone(),
                },
            })
            .collect();

        let text = (!self.text.is_empty()).then(|| self.text.clone());
        let usage = self.usage.clone().unwrap_or_default();

        ChatResponse {
            id: self.id.clone(),
            model: self.model.clone(),
            message: Message {
                role: Role::Assistant,
                parts: text
                    .clone()
                    .map(Part::Text)
                    .into_iter()
                    .chain((!tool_calls.is_empty()).then(|| Part::ToolUse(tool_calls.clone())))
                    .collect(),
                name: None,
            },
            text,
            thinking: None,
            tool_calls,
            usage: Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
                reasoning_tokens: usage.completion_tokens_details.and_then(|d| d.reasoning_tokens),
            },
            finish_reason: self.finish_reason.as_deref().map(map_finish_reason),
        }
    }

    fn process(&mut self, chunk: OpenAiStreamChunk) -> Vec<StreamEvent> {
        if !chunk.id.is_empty() {
            self.id = chunk.id;
        }
        if !chunk.model.is_empty() {
            self.model = chunk.model;
        }
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }

        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content {
                self.text.push_str(&text);
                events.push(StreamEvent::TextDelta(text));
            }

            for delta in choice.delta.tool_calls.unwrap_or_default() {
                let entry = self.tool_calls.entry(delta.index).or_default();
                if let Some(id) = delta.id {
                    entry.id = id;
                }
                if let Some(function) = delta.function {
                    if let Some(name) = function.name {
                        entry.name = name;
                    }
                    if let Some(arguments) = function.arguments {
                        entry.arguments.push_str(&arguments);
                    }
                }
            }

            if let Some(reason) = choice.finish_reason {
                let is_tool_calls = reason == "tool_calls";
                self.finish_reason = Some(reason);

                if is_tool_calls {
                    for pending in self.tool_calls.values() {
                        if serde_json::from_str::<Value>(&pending.arguments).is_ok() {
                            events.push(StreamEvent::ToolCallDelta(ToolCall {
                                id: pending.id.clone(),
                                kind: "function".to_string(),
                                function: FunctionCall {
                                    name: pending.name.clone(),
                                    arguments: pending.arguments.clone(),
                                },
                            }));
                        } else {
                            warn!("tool call '{}' closed with unparseable arguments", pending.name);
                        }
                    }
                }
            }
        }
        events
    }
}

/// Drives an OpenAI-style SSE body through `OpenAiStreamState`, terminating
/// on the `[DONE]` sentinel with exactly one `Completion`.
pub(crate) fn drive_openai_stream(events: impl futures::Stream<Item = SseEvent> + Send + 'static) -> ChatCompletionStream {
    let stream = futures::stream::unfold(
        (Box::pin(events), OpenAiStreamState::default(), Vec::<StreamEvent>::new(), false),
        |(mut events, mut state, mut queued, mut done)| async move {
            loop {
                if done {
                    return None;
                }
                if let Some(event) = queued.pop() {
                    return Some((event, (events, state, queued, done)));
                }

                let Some(raw) = events.next().await else {
                    done = true;
                    return Some((StreamEvent::Completion(Box::new(state.completion())), (events, state, queued, done)));
                };

                if raw.is_done_sentinel() {
                    done = true;
                    return Some((StreamEvent::Completion(Box::new(state.completion())), (events, state, queued, done)));
                }

                let chunk: OpenAiStreamChunk = match sonic_rs::from_str(&raw.data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("failed to parse OpenAI-compatible stream chunk: {e}");
                        continue;
                    }
                };

                let mut new_events = state.process(chunk);
                if new_events.is_empty() {
                    continue;
                }
                new_events.reverse();
                queued = new_events;
            }
        },
    );

    Box::pin(stream)
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn id(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, messages: Vec<Message>) -> Result<ChatResponse> {
        let body = build_chat_body(self.id(), &self.config, &messages, false)?;
        let value = self.transport.post_json("/chat/completions", &self.headers(), body).await?;
        parse_chat_response(value)
    }

    async fn chat_stream(&self, messages: Vec<Message>) -> Result<ChatCompletionStream> {
        let body = build_chat_body(self.id(), &self.config, &messages, true)?;
        let bytes = self.transport.post_sse("/chat/completions", &self.headers(), body).await?;
        Ok(drive_openai_stream(sse::demultiplex(bytes)))
    }

    async fn count_tokens(&self, messages: &[Message]) -> Result<Usage> {
        Ok(token_counter::estimate_tokens_tiktoken(messages, &self.config.model))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        #[derive(Deserialize)]
        struct ModelsResponse {
            data: Vec<ModelEntry>,
        }
        #[derive(Deserialize)]
        struct ModelEntry {
            id: String,
            #[serde(default)]
            owned_by: Option<String>,
        }

        let value = self.transport.get_json("/models", &self.headers()).await?;
        let parsed: ModelsResponse = serde_json::from_value(value).map_err(|e| LlmError::JsonParse(e.to_string()))?;
        Ok(parsed
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                display_name: None,
                owned_by: m.owned_by,
            })
            .collect())
    }

    fn as_audio(&self) -> Option<&dyn crate::capabilities::audio::AudioCapable> {
        Some(self)
    }

    fn as_images(&self) -> Option<&dyn crate::capabilities::images::ImageGeneration> {
        Some(self)
    }

    fn as_moderation(&self) -> Option<&dyn crate::capabilities::moderation::Moderation> {
        Some(self)
    }

    fn as_assistants(&self) -> Option<&dyn crate::capabilities::assistants::Assistants> {
        Some(self)
    }

    fn as_files(&self) -> Option<&dyn crate::capabilities::files::FileManagement> {
        Some(self)
    }

    fn as_embeddings(&self) -> Option<&dyn crate::capabilities::embeddings::Embeddings> {
        Some(self)
    }
}

#[async_trait]
impl crate::capabilities::embeddings::Embeddings for OpenAiProvider {
    async fn embed(&self, request: crate::capabilities::embeddings::EmbeddingRequest) -> Result<crate::capabilities::embeddings::EmbeddingResponse> {
        use crate::capabilities::embeddings::EmbeddingResponse;

        let model = request.model.unwrap_or_else(|| self.config.model.clone());
        let mut body = serde_json::Map::new();
        body.insert("model".to_string(), json!(model));
        body.insert("input".to_string(), json!(request.input));
        if let Some(dimensions) = request.dimensions {
            body.insert("dimensions".to_string(), json!(dimensions));
        }

        let value = self.transport.post_json("/embeddings", &self.headers(), Value::Object(body)).await?;

        let data = value.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
        let embeddings = data
            .iter()
            .map(|entry| {
                entry
                    .get("embedding")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect())
                    .unwrap_or_default()
            })
            .collect();

        let prompt_tokens = value.get("usage").and_then(|u| u.get("prompt_tokens")).and_then(Value::as_u64);
        let total_tokens = value.get("usage").and_then(|u| u.get("total_tokens")).and_then(Value::as_u64);

        Ok(EmbeddingResponse {
            embeddings,
            model: value.get("model").and_then(Value::as_str).map(str::to_string).unwrap_or(model),
            usage: Usage {
                prompt_tokens,
                completion_tokens: None,
                total_tokens,
                reasoning_tokens: None,
            },
        })
    }
}

#[async_trait]
impl crate::capabilities::audio::AudioCapable for OpenAiProvider {
    fn supported_features(&self) -> std::collections::HashSet<crate::capabilities::audio::AudioFeature> {
        use crate::capabilities::audio::AudioFeature;
        std::collections::HashSet::from([AudioFeature::TextToSpeech, AudioFeature::SpeechToText, AudioFeature::AudioTranslation])
    }

    async fn text_to_speech(&self, request: crate::capabilities::audio::TtsRequest) -> Result<crate::capabilities::audio::TtsResponse> {
        use crate::capabilities::audio::{self, AudioFeature};
        audio::require(&self.supported_features(), AudioFeature::TextToSpeech)?;

        let mut body = serde_json::Map::new();
        body.insert("model".to_string(), json!(request.model.unwrap_or_else(|| "tts-1".to_string())));
        body.insert("input".to_string(), json!(request.text));
        body.insert("voice".to_string(), json!(request.voice_id));
        if let Some(format) = &request.output_format {
            body.insert("response_format".to_string(), json!(format));
        }

        let audio_bytes = self
            .transport
            .post_json_bytes("/audio/speech", &self.headers(), Value::Object(body))
            .await?;

        Ok(crate::capabilities::audio::TtsResponse {
            audio: audio_bytes,
            mime_type: request.output_format.unwrap_or_else(|| "audio/mpeg".to_string()),
            alignment: None,
        })
    }

    async fn speech_to_text(&self, request: crate::capabilities::audio::SttRequest) -> Result<crate::capabilities::audio::SttResponse> {
        use crate::capabilities::audio::{self, AudioFeature};
        use crate::transport::FormPart;
        audio::require(&self.supported_features(), AudioFeature::SpeechToText)?;

        let mut parts = vec![
            FormPart::File {
                name: "file".to_string(),
                filename: "audio".to_string(),
                mime: request.mime_type,
                bytes: request.audio,
            },
            FormPart::Text {
                name: "model".to_string(),
                value: request.model.unwrap_or_else(|| "whisper-1".to_string()),
            },
        ];
        if let Some(language) = request.language {
            parts.push(FormPart::Text {
                name: "language".to_string(),
                value: language,
            });
        }
        if let Some(prompt) = request.prompt {
            parts.push(FormPart::Text {
                name: "prompt".to_string(),
                value: prompt,
            });
        }

        let value = self.transport.post_form("/audio/transcriptions", &self.headers(), parts).await?;

        #[derive(Deserialize)]
        struct TranscriptionResponse {
            text: String,
            #[serde(default)]
            language: Option<String>,
            #[serde(default)]
            duration: Option<f64>,
        }
        let parsed: TranscriptionResponse = serde_json::from_value(value).map_err(|e| LlmError::JsonParse(e.to_string()))?;

        Ok(crate::capabilities::audio::SttResponse {
            text: parsed.text,
            language: parsed.language,
            duration_seconds: parsed.duration,
        })
    }
}

#[async_trait]
impl crate::capabilities::images::ImageGeneration for OpenAiProvider {
    fn supported_options(&self) -> crate::capabilities::images::SupportedImageOptions {
        crate::capabilities::images::SupportedImageOptions {
            sizes: vec!["256x256", "512x512", "1024x1024", "1792x1024", "1024x1792"],
            formats: vec!["png", "jpeg"],
        }
    }

    async fn generate(
        &self,
        request: crate::capabilities::images::ImageGenerationRequest,
    ) -> Result<crate::capabilities::images::ImageGenerationResponse> {
        let mut body = serde_json::Map::new();
        body.insert("prompt".to_string(), json!(request.prompt));
        body.insert("model".to_string(), json!(request.model.unwrap_or_else(|| "dall-e-3".to_string())));
        if let Some(size) = &request.size {
            body.insert("size".to_string(), json!(size));
        }
        if let Some(count) = request.count {
            body.insert("n".to_string(), json!(count));
        }

        let value = self.transport.post_json("/images/generations", &self.headers(), Value::Object(body)).await?;
        parse_image_response(value)
    }

    async fn edit(
        &self,
        request: crate::capabilities::images::ImageEditRequest,
    ) -> Result<crate::capabilities::images::ImageGenerationResponse> {
        use crate::transport::FormPart;
        let mut parts = vec![
            FormPart::File {
                name: "image".to_string(),
                filename: "image.png".to_string(),
                mime: "image/png".to_string(),
                bytes: request.image,
            },
            FormPart::Text {
                name: "prompt".to_string(),
                value: request.prompt,
            },
        ];
        if let Some(mask) = request.mask {
            parts.push(FormPart::File {
                name: "mask".to_string(),
                filename: "mask.png".to_string(),
                mime: "image/png".to_string(),
                bytes: mask,
            });
        }
        if let Some(size) = request.size {
            parts.push(FormPart::Text {
                name: "size".to_string(),
                value: size,
            });
        }

        let value = self.transport.post_form("/images/edits", &self.headers(), parts).await?;
        parse_image_response(value)
    }

    async fn variation(
        &self,
        request: crate::capabilities::images::ImageVariationRequest,
    ) -> Result<crate::capabilities::images::ImageGenerationResponse> {
        use crate::transport::FormPart;
        let mut parts = vec![FormPart::File {
            name: "image".to_string(),
            filename: "image.png".to_string(),
            mime: "image/png".to_string(),
            bytes: request.image,
        }];
        if let Some(size) = request.size {
            parts.push(FormPart::Text {
                name: "size".to_string(),
                value: size,
            });
        }
        if let Some(count) = request.count {
            parts.push(FormPart::Text {
                name: "n".to_string(),
                value: count.to_string(),
            });
        }

        let value = self.transport.post_form("/images/variations", &self.headers(), parts).await?;
        parse_image_response(value)
    }
}

fn parse_image_response(value: Value) -> Result<crate::capabilities::images::ImageGenerationResponse> {
    use crate::capabilities::images::GeneratedImage;

    let entries = value.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
    let images = entries
        .into_iter()
        .map(|entry| GeneratedImage {
            url: entry.get("url").and_then(Value::as_str).map(str::to_string),
            base64: entry.get("b64_json").and_then(Value::as_str).map(str::to_string),
        })
        .collect();

    Ok(crate::capabilities::images::ImageGenerationResponse { images })
}

#[async_trait]
impl crate::capabilities::moderation::Moderation for OpenAiProvider {
    async fn moderate(&self, input: &str) -> Result<crate::capabilities::moderation::ModerationResult> {
        use crate::capabilities::moderation::{ModerationCategoryResult, ModerationResult};

        let body = json!({ "input": input });
        let value = self.transport.post_json("/moderations", &self.headers(), body).await?;

        let result = value
            .get("results")
            .and_then(Value::as_array)
            .and_then(|arr| arr.first())
            .cloned()
            .unwrap_or(Value::Null);

        let flagged = result.get("flagged").and_then(Value::as_bool).unwrap_or(false);
        let mut categories = std::collections::HashMap::new();
        if let Some(cats) = result.get("categories").and_then(Value::as_object) {
            let scores = result.get("category_scores").and_then(Value::as_object);
            for (name, flagged_value) in cats {
                let score = scores.and_then(|s| s.get(name)).and_then(Value::as_f64).unwrap_or(0.0);
                categories.insert(
                    name.clone(),
                    ModerationCategoryResult {
                        flagged: flagged_value.as_bool().unwrap_or(false),
                        score,
                    },
                );
            }
        }

        Ok(ModerationResult { flagged, categories })
    }
}

#[async_trait]
impl crate::capabilities::assistants::Assistants for OpenAiProvider {
    async fn create(&self, model: &str, name: Option<&str>, instructions: Option<&str>, tools: Vec<crate::tool::Tool>) -> Result<crate::capabilities::assistants::Assistant> {
        use crate::capabilities::assistants::tool_to_openai_json;

        let mut body = serde_json::Map::new();
        body.insert("model".to_string(), json!(model));
        if let Some(name) = name {
            body.insert("name".to_string(), json!(name));
        }
        if let Some(instructions) = instructions {
            body.insert("instructions".to_string(), json!(instructions));
        }
        if !tools.is_empty() {
            body.insert("tools".to_string(), Value::Array(tools.iter().map(tool_to_openai_json).collect()));
        }

        let value = self.transport.post_json("/assistants", &self.headers(), Value::Object(body)).await?;
        parse_assistant(value)
    }

    async fn list(&self) -> Result<Vec<crate::capabilities::assistants::Assistant>> {
        let value = self.transport.get_json("/assistants", &self.headers()).await?;
        let entries = value.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
        entries.into_iter().map(parse_assistant).collect()
    }

    async fn retrieve(&self, id: &str) -> Result<crate::capabilities::assistants::Assistant> {
        let value = self.transport.get_json(&format!("/assistants/{id}"), &self.headers()).await?;
        parse_assistant(value)
    }

    async fn modify(&self, id: &str, update: crate::capabilities::assistants::AssistantUpdate) -> Result<crate::capabilities::assistants::Assistant> {
        use crate::capabilities::assistants::tool_to_openai_json;

        let mut body = serde_json::Map::new();
        if let Some(name) = update.name {
            body.insert("name".to_string(), json!(name));
        }
        if let Some(instructions) = update.instructions {
            body.insert("instructions".to_string(), json!(instructions));
        }
        if let Some(tools) = update.tools {
            body.insert("tools".to_string(), Value::Array(tools.iter().map(tool_to_openai_json).collect()));
        }

        let value = self
            .transport
            .post_json(&format!("/assistants/{id}"), &self.headers(), Value::Object(body))
            .await?;
        parse_assistant(value)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.transport.delete(&format!("/assistants/{id}"), &self.headers()).await?;
        Ok(())
    }
}

fn parse_assistant(value: Value) -> Result<crate::capabilities::assistants::Assistant> {
    use crate::capabilities::assistants::Assistant;
    use crate::tool::{FunctionDefinition, ParametersSchema, Tool};

    let id = value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LlmError::ResponseFormat {
            raw: "assistant object missing 'id'".to_string(),
        })?;
    let model = value.get("model").and_then(Value::as_str).unwrap_or_default().to_string();
    let name = value.get("name").and_then(Value::as_str).map(str::to_string);
    let instructions = value.get("instructions").and_then(Value::as_str).map(str::to_string);

    let tools = value
        .get("tools")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|t| t.get("function"))
                .map(|f| Tool {
                    kind: "function".to_string(),
                    function: FunctionDefinition {
                        name: f.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                        description: f.get("description").and_then(Value::as_str).unwrap_or_default().to_string(),
                        parameters: f
                            .get("parameters")
                            .and_then(|p| serde_json::from_value::<ParametersSchema>(p.clone()).ok())
                            .unwrap_or_default(),
                    },
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Assistant {
        id,
        name,
        model,
        instructions,
        tools,
    })
}

#[async_trait]
impl crate::capabilities::files::FileManagement for OpenAiProvider {
    async fn upload(&self, filename: &str, mime: &str, bytes: Vec<u8>, purpose: &str) -> Result<crate::capabilities::files::FileObject> {
        crate::capabilities::files::OpenAiShapedFiles::new(self.transport.as_ref(), self.headers())
            .upload(filename, mime, bytes, purpose)
            .await
    }

    async fn list(&self, query: Option<&str>) -> Result<crate::capabilities::files::FileListPage> {
        crate::capabilities::files::OpenAiShapedFiles::new(self.transport.as_ref(), self.headers())
            .list(query)
            .await
    }

    async fn retrieve(&self, id: &str) -> Result<crate::capabilities::files::FileObject> {
        crate::capabilities::files::OpenAiShapedFiles::new(self.transport.as_ref(), self.headers())
            .retrieve(id)
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        crate::capabilities::files::OpenAiShapedFiles::new(self.transport.as_ref(), self.headers())
            .delete(id)
            .await
    }

    async fn get_content(&self, id: &str) -> Result<Vec<u8>> {
        crate::capabilities::files::OpenAiShapedFiles::new(self.transport.as_ref(), self.headers())
            .get_content(id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_text_response_and_usage() {
        let raw = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{"message": {"content": "hi there"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        });
        let response = parse_chat_response(raw).unwrap();
        assert_eq!(response.text.as_deref(), Some("hi there"));
        assert_eq!(response.usage.total_tokens, Some(5));
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn missing_choices_is_response_format_error() {
        let raw = json!({"id": "x", "model": "m", "choices": []});
        let err = parse_chat_response(raw);
        assert!(matches!(err, Err(LlmError::ResponseFormat { .. })));
    }

    #[test]
    fn stream_state_buffers_tool_call_across_deltas() {
        let mut state = OpenAiStreamState::default();
        state.process(OpenAiStreamChunk {
            id: "c1".to_string(),
            model: "gpt-4o-mini".to_string(),
            choices: vec![OpenAiStreamChoice {
                delta: OpenAiStreamDelta {
                    content: None,
                    tool_calls: Some(vec![OpenAiStreamToolCall {
                        index: 0,
                        id: Some("call_1".to_string()),
                        function: Some(OpenAiStreamFunctionDelta {
                            name: Some("add".to_string()),
                            arguments: Some("{\"a\":1".to_string()),
                        }),
                    }]),
                },
                finish_reason: None,
            }],
            usage: None,
        });
        let events = state.process(OpenAiStreamChunk {
            id: String::new(),
            model: String::new(),
            choices: vec![OpenAiStreamChoice {
                delta: OpenAiStreamDelta {
                    content: None,
                    tool_calls: Some(vec![OpenAiStreamToolCall {
                        index: 0,
                        id: None,
                        function: Some(OpenAiStreamFunctionDelta {
                            name: None,
                            arguments: Some(",\"b\":2}".to_string()),
                        }),
                    }]),
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
            usage: None,
        });

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::ToolCallDelta(c) if c.function.arguments == "{\"a\":1,\"b\":2}"));
    }

    #[test]
    fn tool_result_message_expands_to_one_wire_message_per_item() {
        use crate::message::ToolResultItem;

        let message = Message {
            role: Role::User,
            parts: vec![Part::ToolResult(vec![
                ToolResultItem {
                    tool_call_id: "call_1".to_string(),
                    content: "4".to_string(),
                    is_error: false,
                },
                ToolResultItem {
                    tool_call_id: "call_2".to_string(),
                    content: "-1".to_string(),
                    is_error: false,
                },
            ])],
            name: None,
        };

        let wire_messages = message_to_json(&message);

        assert_eq!(wire_messages.len(), 2);
        assert_eq!(wire_messages[0]["tool_call_id"], "call_1");
        assert_eq!(wire_messages[1]["tool_call_id"], "call_2");
    }

    #[test]
    fn tool_use_message_carries_every_parallel_call() {
        let message = Message {
            role: Role::Assistant,
            parts: vec![Part::ToolUse(vec![
                ToolCall {
                    id: "call_1".to_string(),
                    kind: "function".to_string(),
                    function: crate::tool::FunctionCall {
                        name: "add".to_string(),
                        arguments: "{\"a\":1}".to_string(),
                    },
                },
                ToolCall {
                    id: "call_2".to_string(),
                    kind: "function".to_string(),
                    function: crate::tool::FunctionCall {
                        name: "sub".to_string(),
                        arguments: "{\"a\":2}".to_string(),
                    },
                },
            ])],
            name: None,
        };

        let wire_messages = message_to_json(&message);

        assert_eq!(wire_messages.len(), 1);
        let tool_calls = wire_messages[0]["tool_calls"].as_array().unwrap();
        assert_eq!(tool_calls.len(), 2);
        assert_eq!(tool_calls[0]["id"], "call_1");
        assert_eq!(tool_calls[1]["id"], "call_2");
    }

    #[test]
    fn tool_use_message_preserves_accompanying_text() {
        let message = Message {
            role: Role::Assistant,
            parts: vec![
                Part::Text("Let me check that for you.".to_string()),
                Part::ToolUse(vec![ToolCall {
                    id: "call_1".to_string(),
                    kind: "function".to_string(),
                    function: crate::tool::FunctionCall {
                        name: "add".to_string(),
                        arguments: "{\"a\":1}".to_string(),
                    },
                }]),
            ],
            name: None,
        };

        let wire_messages = message_to_json(&message);

        assert_eq!(wire_messages.len(), 1);
        assert_eq!(wire_messages[0]["content"], "Let me check that for you.");
        assert_eq!(wire_messages[0]["tool_calls"].as_array().unwrap().len(), 1);
    }
}
