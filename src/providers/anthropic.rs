//! Anthropic Messages API translator and provider factory.
//!
//! Header composition, the response struct shape, and the
//! `AnthropicStreamEvent` tagged enum all mirror Anthropic's own wire
//! shapes directly. The streaming state machine buffers every
//! `input_json_delta` rather than re-emitting it as a passthrough chunk:
//! this crate's `ToolCallDelta` is defined to carry complete, parseable
//! arguments, so deltas accumulate and only surface once
//! `content_block_stop` closes the block.

use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use log::warn;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::capability::Capability;
use crate::config::Config;
use crate::error::{LlmError, Result};
use crate::message::{ChatResponse, FinishReason, ImageMime, Message, Part, Role, StreamEvent, REDACTED_THINKING_SENTINEL};
use crate::provider::{ChatCompletionStream, ModelInfo, Provider, ProviderFactory};
use crate::sse;
use crate::tool::{FunctionCall, ToolCall, ToolChoice};
use crate::token_counter;
use crate::transport::{ReqwestTransport, Transport};
use crate::usage::Usage;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_MAX_THINKING_BUDGET_TOKENS: u32 = 32_000;

pub(crate) struct AnthropicFactory;

impl ProviderFactory for AnthropicFactory {
    fn provider_id(&self) -> &'static str {
        "anthropic"
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
        ]
    }

    fn display_name(&self) -> &'static str {
        "Anthropic"
    }

    fn description(&self) -> &'static str {
        "Claude models via the Anthropic Messages API"
    }

    fn default_config(&self) -> Config {
        Config::new(DEFAULT_BASE_URL, "claude-3-5-sonnet-20241022")
    }

    fn validate_config(&self, config: &Config) -> bool {
        !config.base_url.is_empty() && !config.model.is_empty()
    }

    fn create(&self, config: Config) -> Result<Box<dyn Provider>> {
        Ok(Box::new(AnthropicProvider::new(config)?))
    }
}

pub(crate) struct AnthropicProvider {
    transport: Box<dyn Transport>,
    config: Config,
}

impl AnthropicProvider {
    fn new(config: Config) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(config.base_url.clone(), config.timeout)?;
        Ok(AnthropicProvider {
            transport: Box::new(transport),
            config,
        })
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
        ];

        if let Some(key) = &self.config.api_key {
            headers.push(("x-api-key".to_string(), key.0.expose_secret().to_string()));
        }

        let mut beta_flags = vec!["output-128k-2025-02-19".to_string()];
        if self.config.extensions.get("interleavedThinking").and_then(Value::as_bool) == Some(true) {
            beta_flags.push("interleaved-thinking-2025-05-14".to_string());
        }
        if self.config.has_extension("mcpServers") {
            beta_flags.push("mcp-client-2025-04-04".to_string());
        }
        headers.push(("anthropic-beta".to_string(), beta_flags.join(",")));

        crate::header_rules::apply(&self.config.header_rules, headers, &self.config)
    }

    /// `headers()` plus the `files-api-2025-04-14` beta flag, added only
    /// for file endpoint calls rather than every request.
    fn file_headers(&self) -> Vec<(String, String)> {
        let mut headers = self.headers();
        if let Some(existing) = headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case("anthropic-beta")) {
            existing.1 = format!("{},files-api-2025-04-14", existing.1);
        }
        headers
    }

    fn reasoning_requested(&self) -> bool {
        self.config.extensions.get("reasoning").and_then(Value::as_bool) == Some(true)
    }

    fn build_request(&self, messages: Vec<Message>, stream: bool) -> Result<Value> {
        crate::model_capabilities::warn_on_mismatch("anthropic", &self.config);
        let capabilities = crate::model_capabilities::lookup("anthropic", &self.config.model);

        let (system, vendor_messages) = partition_messages(&messages, self.config.system_prompt.as_deref())?;

        let mut body = serde_json::Map::new();
        body.insert("model".to_string(), json!(self.config.model));
        body.insert("messages".to_string(), Value::Array(vendor_messages));
        body.insert("max_tokens".to_string(), json!(self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)));
        body.insert("stream".to_string(), json!(stream));

        if let Some(system) = system {
            body.insert("system".to_string(), json!(system));
        }
        if let Some(temperature) = self.config.temperature {
            if capabilities.disable_temperature {
                warn!("model '{}' does not accept 'temperature'; omitting it from the request", self.config.model);
            } else {
                body.insert("temperature".to_string(), json!(temperature));
            }
        }
        if let Some(top_p) = self.config.top_p {
            if capabilities.disable_top_p {
                warn!("model '{}' does not accept 'top_p'; omitting it from the request", self.config.model);
            } else {
                body.insert("top_p".to_string(), json!(top_p));
            }
        }
        if let Some(top_k) = self.config.top_k {
            body.insert("top_k".to_string(), json!(top_k));
        }
        if let Some(stop) = &self.config.stop_sequences {
            body.insert("stop_sequences".to_string(), json!(stop));
        }
        if let Some(tier) = &self.config.service_tier {
            body.insert("service_tier".to_string(), json!(tier));
        }
        if let Some(container) = self.config.extensions.get("container") {
            body.insert("container".to_string(), container.clone());
        }
        if let Some(mcp_servers) = self.config.extensions.get("mcpServers") {
            body.insert("mcp_servers".to_string(), mcp_servers.clone());
        }

        let mut metadata = serde_json::Map::new();
        if let Some(user) = &self.config.user {
            metadata.insert("user_id".to_string(), json!(user));
        }
        if let Some(Value::Object(extra)) = self.config.extensions.get("metadata") {
            for (k, v) in extra {
                metadata.insert(k.clone(), v.clone());
            }
        }
        if !metadata.is_empty() {
            body.insert("metadata".to_string(), Value::Object(metadata));
        }

        if let Some(tools) = &self.config.tools {
            let converted: Vec<Value> = tools
                .iter()
                .map(|t| {
                    let mut input_schema = serde_json::to_value(&t.function.parameters).unwrap_or(json!({}));
                    if let Value::Object(ref mut obj) = input_schema {
                        obj.insert("type".to_string(), json!("object"));
                        obj.entry("properties").or_insert_with(|| json!({}));
                    }
                    let description = if t.function.description.is_empty() {
                        t.function.name.clone()
                    } else {
                        t.function.description.clone()
                    };
                    json!({
                        "name": t.function.name,
                        "description": description,
                        "input_schema": input_schema,
                    })
                })
                .collect();
            body.insert("tools".to_string(), Value::Array(converted));
        }

        if let Some(choice) = &self.config.tool_choice {
            body.insert("tool_choice".to_string(), tool_choice_to_json(choice));
        }

        if self.reasoning_requested() {
            let mut thinking = serde_json::Map::new();
            thinking.insert("type".to_string(), json!("enabled"));
            if let Some(budget) = self.config.extensions.get("thinkingBudgetTokens").and_then(Value::as_u64) {
                let cap = self
                    .config
                    .extensions
                    .get("maxThinkingBudgetTokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(DEFAULT_MAX_THINKING_BUDGET_TOKENS as u64);
                if budget < 1024 {
                    warn!("thinkingBudgetTokens {budget} is below the recommended minimum of 1024");
                }
                if budget > cap {
                    return Err(LlmError::InvalidRequest(format!(
                        "thinkingBudgetTokens {budget} exceeds the configured cap of {cap}"
                    )));
                }
                thinking.insert("budget_tokens".to_string(), json!(budget));
            }
            body.insert("thinking".to_string(), Value::Object(thinking));
        }

        Ok(Value::Object(body))
    }
}

fn tool_choice_to_json(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto { disable_parallel } => {
            json!({"type": "auto", "disable_parallel_tool_use": disable_parallel})
        }
        ToolChoice::Any { disable_parallel } => {
            json!({"type": "any", "disable_parallel_tool_use": disable_parallel})
        }
        ToolChoice::Specific { name, disable_parallel } => {
            json!({"type": "tool", "name": name, "disable_parallel_tool_use": disable_parallel})
        }
        ToolChoice::None => json!("none"),
    }
}

/// Splits `messages` into the top-level `system` string (config prompt
/// followed by concatenated system-role messages, `\n\n`-joined) and the
/// vendor message array. Fails if no non-system message survives or any
/// surviving message is effectively empty; warns (does not fail) if the
/// conversation doesn't open on `user` or repeats a role.
fn partition_messages(messages: &[Message], system_prompt: Option<&str>) -> Result<(Option<String>, Vec<Value>)> {
    let mut system_parts: Vec<String> = system_prompt.map(|s| s.to_string()).into_iter().collect();
    let mut non_system = Vec::new();

    for message in messages {
        if message.role == Role::System {
            if let Some(text) = message.text() {
                system_parts.push(text);
            }
        } else {
            non_system.push(message);
        }
    }

    if non_system.is_empty() {
        return Err(LlmError::InvalidRequest("at least one non-system message is required".to_string()));
    }

    for message in &non_system {
        if message.is_effectively_empty() {
            return Err(LlmError::InvalidRequest("message content must not be empty".to_string()));
        }
    }

    if non_system[0].role != Role::User {
        warn!("conversation does not open on a user message");
    }
    for pair in non_system.windows(2) {
        if pair[0].role == pair[1].role {
            warn!("consecutive messages with the same role ({:?})", pair[0].role);
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };

    let vendor_messages = non_system.iter().map(|m| message_to_json(m)).collect();
    Ok((system, vendor_messages))
}

fn message_to_json(message: &Message) -> Value {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => unreachable!("system messages are partitioned out before this point"),
    };

    let content: Vec<Value> = message.parts.iter().flat_map(part_to_json).collect();
    json!({"role": role, "content": content})
}

/// Converts one `Part` into zero or more Anthropic content blocks. A
/// `ToolUse`/`ToolResult` part carrying several parallel calls/results
/// expands into that many blocks within the same message's `content`
/// array, since Anthropic has no batched wrapper for either block type.
fn part_to_json(part: &Part) -> Vec<Value> {
    match part {
        Part::Text(text) => vec![json!({"type": "text", "text": text})],
        Part::Image { mime, bytes } => vec![json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": mime.as_mime_type(),
                "data": base64::engine::general_purpose::STANDARD.encode(bytes),
            }
        })],
        Part::ImageUrl(url) => vec![json!({
            "type": "text",
            "text": format!("[Image URL not supported by Anthropic: {url}]"),
        })],
        Part::File { mime, bytes } if mime == "application/pdf" => vec![json!({
            "type": "document",
            "source": {
                "type": "base64",
                "media_type": "application/pdf",
                "data": base64::engine::general_purpose::STANDARD.encode(bytes),
            }
        })],
        Part::File { mime, .. } => vec![json!({
            "type": "text",
            "text": format!("[File of type '{mime}' not supported by Anthropic]"),
        })],
        Part::ToolUse(calls) => calls
            .iter()
            .map(|call| {
                let input: Value = serde_json::from_str(&call.function.arguments).unwrap_or(json!({}));
                json!({"type": "tool_use", "id": call.id, "name": call.function.name, "input": input})
            })
            .collect(),
        Part::ToolResult(items) => items
            .iter()
            .map(|item| {
                json!({
                    "type": "tool_result",
                    "tool_use_id": item.tool_call_id,
                    "content": item.content,
                    "is_error": item.is_error,
                })
            })
            .collect(),
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    #[serde(default)]
    model: String,
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    r#type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        "refusal" => FinishReason::ContentFilter,
        "pause_turn" => {
            warn!("Anthropic paused its turn (pause_turn); treating as a stop for this response");
            FinishReason::Stop
        }
        other => {
            warn!("unrecognized Anthropic stop_reason '{other}'; treating as a stop");
            FinishReason::Stop
        }
    }
}

fn parse_response(response: AnthropicResponse) -> ChatResponse {
    let mut text_blocks = Vec::new();
    let mut thinking_blocks = Vec::new();
    let mut tool_calls = Vec::new();
    let mut parts = Vec::new();

    for block in response.content {
        match block.r#type.as_str() {
            "text" => {
                let text = block.text.unwrap_or_default();
                parts.push(Part::Text(text.clone()));
                text_blocks.push(text);
            }
            "thinking" => {
                let text = block.thinking.unwrap_or_default();
                thinking_blocks.push(text);
            }
            "redacted_thinking" => {
                thinking_blocks.push(REDACTED_THINKING_SENTINEL.to_string());
            }
            "tool_use" | "mcp_tool_use" => {
                let call = ToolCall {
                    id: block.id.unwrap_or_else(|| format!("toolu_{}", uuid::Uuid::new_v4())),
                    kind: "function".to_string(),
                    function: FunctionCall {
                        name: block.name.unwrap_or_default(),
                        arguments: block
                            .input
                            .map(|v| serde_json::to_string(&v).unwrap_or_else(|_| "{}".to_string()))
                            .unwrap_or_else(|| "{}".to_string()),
                    },
                };
                tool_calls.push(call.clone());
                parts.push(Part::ToolUse(vec![call]));
            }
            other => {
                warn!("unrecognized Anthropic content block type '{other}'");
            }
        }
    }

    let text = (!text_blocks.is_empty()).then(|| text_blocks.join("\n"));
    let thinking = (!thinking_blocks.is_empty()).then(|| thinking_blocks.join("\n"));

    ChatResponse {
        id: response.id,
        model: response.model,
        message: Message {
            role: Role::Assistant,
            parts,
            name: None,
        },
        text,
        thinking,
        tool_calls,
        usage: Usage {
            prompt_tokens: Some(response.usage.input_tokens),
            completion_tokens: Some(response.usage.output_tokens),
            total_tokens: Some(response.usage.input_tokens + response.usage.output_tokens),
            reasoning_tokens: None,
        },
        finish_reason: response.stop_reason.as_deref().map(map_stop_reason),
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    MessageStart { message: AnthropicStreamMessage },
    ContentBlockStart { index: u32, content_block: AnthropicContentBlock },
    ContentBlockDelta { index: u32, delta: AnthropicDelta },
    ContentBlockStop { index: u32 },
    MessageDelta { delta: AnthropicMessageDelta, usage: AnthropicUsage },
    MessageStop,
    Ping,
    Error { error: AnthropicStreamErrorBody },
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamMessage {
    id: String,
    model: String,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    InputJsonDelta { partial_json: String },
    SignatureDelta { signature: String },
}

#[derive(Debug, Deserialize, Default)]
struct AnthropicMessageDelta {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

enum BlockKind {
    Text,
    Thinking,
    ToolUse { id: String, name: String, buffer: String },
}

/// Explicit-state translator from Anthropic SSE events to `StreamEvent`s,
/// one instance per in-flight stream — a plain struct with an explicit
/// state field rather than implicit coroutine state, so resumption and
/// cancellation stay cheap.
struct AnthropicStreamState {
    message_id: String,
    model: String,
    current_block: Option<BlockKind>,
    usage: AnthropicUsage,
    stop_reason: Option<String>,
    text_blocks: Vec<String>,
    thinking_blocks: Vec<String>,
    tool_calls: Vec<ToolCall>,
    done: bool,
}

impl AnthropicStreamState {
    fn new() -> Self {
        AnthropicStreamState {
            message_id: String::new(),
            model: String::new(),
            current_block: None,
            usage: AnthropicUsage::default(),
            stop_reason: None,
            text_blocks: Vec::new(),
            thinking_blocks: Vec::new(),
            tool_calls: Vec::new(),
            done: false,
        }
    }

    fn completion(&self) -> ChatResponse {
        let text = (!self.text_blocks.is_empty()).then(|| self.text_blocks.join("\n"));
        let thinking = (!self.thinking_blocks.is_empty()).then(|| self.thinking_blocks.join("\n"));

        ChatResponse {
            id: self.message_id.clone(),
            model: self.model.clone(),
            message: Message {
                role: Role::Assistant,
                parts: self
                    .tool_calls
                    .iter()
                    .cloned()
                    .map(|c| Part::ToolUse(vec![c]))
                    .chain(text.clone().map(Part::Text))
                    .collect(),
                name: None,
            },
            text,
            thinking,
            tool_calls: self.tool_calls.clone(),
            usage: Usage {
                prompt_tokens: Some(self.usage.input_tokens),
                completion_tokens: Some(self.usage.output_tokens),
                total_tokens: Some(self.usage.input_tokens + self.usage.output_tokens),
                reasoning_tokens: None,
            },
            finish_reason: self.stop_reason.as_deref().map(map_stop_reason),
        }
    }

    /// Processes one decoded event, returning every `StreamEvent` it
    /// produces (almost always 0 or 1; never emits after `Completion`/
    /// `Error`).
    fn process(&mut self, event: AnthropicStreamEvent) -> Vec<StreamEvent> {
        if self.done {
            return Vec::new();
        }

        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                self.message_id = message.id;
                self.model = message.model;
                self.usage = message.usage;
                Vec::new()
            }
            AnthropicStreamEvent::ContentBlockStart { content_block, .. } => {
                self.current_block = match content_block.r#type.as_str() {
                    "text" => Some(BlockKind::Text),
                    "thinking" | "redacted_thinking" => Some(BlockKind::Thinking),
                    "tool_use" => Some(BlockKind::ToolUse {
                        id: content_block.id.unwrap_or_else(|| format!("toolu_{}", uuid::Uuid::new_v4())),
                        name: content_block.name.unwrap_or_default(),
                        buffer: String::new(),
                    }),
                    other => {
                        warn!("unrecognized Anthropic content_block_start type '{other}'");
                        None
                    }
                };
                Vec::new()
            }
            AnthropicStreamEvent::ContentBlockDelta { delta, .. } => match (delta, &mut self.current_block) {
                (AnthropicDelta::TextDelta { text }, Some(BlockKind::Text)) => {
                    vec![StreamEvent::TextDelta(text)]
                }
                (AnthropicDelta::ThinkingDelta { thinking }, Some(BlockKind::Thinking)) => {
                    vec![StreamEvent::ThinkingDelta(thinking)]
                }
                (AnthropicDelta::InputJsonDelta { partial_json }, Some(BlockKind::ToolUse { buffer, .. })) => {
                    buffer.push_str(&partial_json);
                    Vec::new()
                }
                (AnthropicDelta::SignatureDelta { .. }, _) => Vec::new(),
                _ => Vec::new(),
            },
            AnthropicStreamEvent::ContentBlockStop { .. } => match self.current_block.take() {
                Some(BlockKind::Text) => Vec::new(),
                Some(BlockKind::Thinking) => Vec::new(),
                Some(BlockKind::ToolUse { id, name, buffer }) => match serde_json::from_str::<Value>(&buffer) {
                    Ok(arguments) => {
                        let call = ToolCall {
                            id,
                            kind: "function".to_string(),
                            function: FunctionCall {
                                name,
                                arguments: serde_json::to_string(&arguments).unwrap_or(buffer),
                            },
                        };
                        self.tool_calls.push(call.clone());
                        vec![StreamEvent::ToolCallDelta(call)]
                    }
                    Err(e) => {
                        self.done = true;
                        vec![StreamEvent::Error(LlmError::JsonParse(format!("malformed tool arguments: {e}")))]
                    }
                },
                None => Vec::new(),
            },
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                self.usage = usage;
                self.stop_reason = delta.stop_reason;
                Vec::new()
            }
            AnthropicStreamEvent::MessageStop => {
                self.done = true;
                vec![StreamEvent::Completion(Box::new(self.completion()))]
            }
            AnthropicStreamEvent::Ping => Vec::new(),
            AnthropicStreamEvent::Error { error } => {
                self.done = true;
                vec![StreamEvent::Error(LlmError::from_anthropic_type(&error.error_type, &error.message))]
            }
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn id(&self) -> &'static str {
        "anthropic"
    }

    async fn chat(&self, messages: Vec<Message>) -> Result<ChatResponse> {
        let body = self.build_request(messages, false)?;
        let value = self.transport.post_json("/messages", &self.headers(), body).await?;
        let response: AnthropicResponse = serde_json::from_value(value).map_err(|e| LlmError::JsonParse(e.to_string()))?;
        Ok(parse_response(response))
    }

    async fn chat_stream(&self, messages: Vec<Message>) -> Result<ChatCompletionStream> {
        let body = self.build_request(messages, true)?;
        let bytes = self.transport.post_sse("/messages", &self.headers(), body).await?;
        let events = sse::demultiplex(bytes);

        let stream = futures::stream::unfold(
            (Box::pin(events), AnthropicStreamState::new(), Vec::<StreamEvent>::new()),
            |(mut events, mut state, mut queued)| async move {
                loop {
                    if let Some(event) = queued.pop() {
                        return Some((event, (events, state, queued)));
                    }

                    let Some(raw) = events.next().await else { return None };

                    let parsed: AnthropicStreamEvent = match sonic_rs::from_str(&raw.data) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            warn!("failed to parse Anthropic stream event: {e}");
                            continue;
                        }
                    };

                    let mut new_events = state.process(parsed);
                    if new_events.is_empty() {
                        continue;
                    }
                    new_events.reverse();
                    queued = new_events;
                }
            },
        );

        Ok(Box::pin(stream))
    }

    async fn count_tokens(&self, messages: &[Message]) -> Result<Usage> {
        let body = self.build_request(messages.to_vec(), false)?;
        match self.transport.post_json("/messages/count_tokens", &self.headers(), body).await {
            Ok(value) => {
                let input_tokens = value.get("input_tokens").and_then(Value::as_u64).unwrap_or(0);
                Ok(Usage {
                    prompt_tokens: Some(input_tokens),
                    completion_tokens: None,
                    total_tokens: Some(input_tokens),
                    reasoning_tokens: None,
                })
            }
            Err(e) => {
                warn!("Anthropic count_tokens endpoint failed ({e}); falling back to coarse estimate");
                Ok(token_counter::estimate_tokens(messages))
            }
        }
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
            display_name: Option<String>,
        }

        let value = self.transport.get_json("/models", &self.headers()).await?;
        let parsed: ModelsResponse = serde_json::from_value(value).map_err(|e| LlmError::JsonParse(e.to_string()))?;
        Ok(parsed
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                display_name: m.display_name,
                owned_by: Some("anthropic".to_string()),
            })
            .collect())
    }

    fn as_files(&self) -> Option<&dyn crate::capabilities::files::FileManagement> {
        Some(self)
    }
}

#[async_trait]
impl crate::capabilities::files::FileManagement for AnthropicProvider {
    async fn upload(&self, filename: &str, mime: &str, bytes: Vec<u8>, purpose: &str) -> Result<crate::capabilities::files::FileObject> {
        crate::capabilities::files::OpenAiShapedFiles::new(self.transport.as_ref(), self.file_headers())
            .upload(filename, mime, bytes, purpose)
            .await
    }

    async fn list(&self, query: Option<&str>) -> Result<crate::capabilities::files::FileListPage> {
        crate::capabilities::files::OpenAiShapedFiles::new(self.transport.as_ref(), self.file_headers())
            .list(query)
            .await
    }

    async fn retrieve(&self, id: &str) -> Result<crate::capabilities::files::FileObject> {
        crate::capabilities::files::OpenAiShapedFiles::new(self.transport.as_ref(), self.file_headers())
            .retrieve(id)
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        crate::capabilities::files::OpenAiShapedFiles::new(self.transport.as_ref(), self.file_headers())
            .delete(id)
            .await
    }

    async fn get_content(&self, id: &str) -> Result<Vec<u8>> {
        crate::capabilities::files::OpenAiShapedFiles::new(self.transport.as_ref(), self.file_headers())
            .get_content(id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, ToolResultItem};

    #[test]
    fn non_stream_response_joins_text_and_sums_usage() {
        let raw = json!({
            "id": "msg_1",
            "model": "claude-3-5-sonnet-20241022",
            "content": [{"type": "text", "text": "hello"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 5, "output_tokens": 1}
        });
        let response: AnthropicResponse = serde_json::from_value(raw).unwrap();
        let chat = parse_response(response);

        assert_eq!(chat.text.as_deref(), Some("hello"));
        assert_eq!(chat.usage.total_tokens, Some(6));
        assert_eq!(chat.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn redacted_thinking_contributes_sentinel() {
        let raw = json!({
            "id": "msg_2",
            "model": "m",
            "content": [{"type": "redacted_thinking"}, {"type": "text", "text": "hi"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1, "output_tokens": 1}
        });
        let response: AnthropicResponse = serde_json::from_value(raw).unwrap();
        let chat = parse_response(response);
        assert_eq!(chat.thinking.as_deref(), Some(REDACTED_THINKING_SENTINEL));
    }

    #[test]
    fn empty_conversation_is_invalid_request() {
        let err = partition_messages(&[], None);
        assert!(matches!(err, Err(LlmError::InvalidRequest(_))));
    }

    #[test]
    fn only_system_messages_is_invalid_request() {
        let err = partition_messages(&[Message::system("be nice")], None);
        assert!(matches!(err, Err(LlmError::InvalidRequest(_))));
    }

    #[test]
    fn system_messages_and_config_prompt_join_with_blank_line() {
        let (system, _) = partition_messages(&[Message::system("rule one"), Message::user("hi")], Some("base prompt")).unwrap();
        assert_eq!(system.as_deref(), Some("base prompt\n\nrule one"));
    }

    #[test]
    fn build_request_matches_the_canonical_non_stream_body() {
        let config = Config::new(DEFAULT_BASE_URL, "claude-3-5-sonnet-20241022").with_api_key("k");
        let provider = AnthropicProvider::new(config).unwrap();

        let body = provider.build_request(vec![Message::user("hi")], false).unwrap();

        assert_eq!(
            body,
            json!({
                "model": "claude-3-5-sonnet-20241022",
                "messages": [{"role": "user", "content": [{"type": "text", "text": "hi"}]}],
                "max_tokens": 1024,
                "stream": false,
            })
        );
    }

    #[test]
    fn tool_choice_none_serializes_to_bare_string() {
        assert_eq!(tool_choice_to_json(&ToolChoice::None), json!("none"));
    }

    #[test]
    fn image_url_part_becomes_explanatory_text() {
        let blocks = part_to_json(&Part::ImageUrl("https://x/y.png".to_string()));
        let text = blocks[0].get("text").and_then(Value::as_str).unwrap();
        assert!(text.starts_with("[Image URL not supported by Anthropic"));
    }

    #[test]
    fn tool_use_part_with_parallel_calls_expands_to_one_block_each() {
        let calls = vec![
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
        ];

        let blocks = part_to_json(&Part::ToolUse(calls));

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["id"], "call_1");
        assert_eq!(blocks[1]["id"], "call_2");
    }

    #[test]
    fn tool_result_part_with_parallel_results_expands_to_one_block_each() {
        let items = vec![
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
        ];

        let blocks = part_to_json(&Part::ToolResult(items));

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["tool_use_id"], "call_1");
        assert_eq!(blocks[1]["tool_use_id"], "call_2");
    }

    #[test]
    fn tool_use_stream_emits_single_delta_then_completion() {
        let mut state = AnthropicStreamState::new();

        let events = [
            AnthropicStreamEvent::ContentBlockStart {
                index: 0,
                content_block: AnthropicContentBlock {
                    r#type: "tool_use".to_string(),
                    text: None,
                    thinking: None,
                    id: Some("t1".to_string()),
                    name: Some("add".to_string()),
                    input: None,
                },
            },
            AnthropicStreamEvent::ContentBlockDelta {
                index: 0,
                delta: AnthropicDelta::InputJsonDelta {
                    partial_json: "{\"a\":1,".to_string(),
                },
            },
            AnthropicStreamEvent::ContentBlockDelta {
                index: 0,
                delta: AnthropicDelta::InputJsonDelta {
                    partial_json: "\"b\":2}".to_string(),
                },
            },
            AnthropicStreamEvent::ContentBlockStop { index: 0 },
            AnthropicStreamEvent::MessageStop,
        ];

        let mut all_emitted = Vec::new();
        for event in events {
            all_emitted.extend(state.process(event));
        }

        assert_eq!(all_emitted.len(), 2);
        assert!(matches!(&all_emitted[0], StreamEvent::ToolCallDelta(call) if call.id == "t1" && call.function.name == "add"));
        assert!(matches!(&all_emitted[1], StreamEvent::Completion(_)));
    }

    #[test]
    fn malformed_tool_arguments_emit_error_and_stop_further_events() {
        let mut state = AnthropicStreamState::new();
        state.process(AnthropicStreamEvent::ContentBlockStart {
            index: 0,
            content_block: AnthropicContentBlock {
                r#type: "tool_use".to_string(),
                text: None,
                thinking: None,
                id: Some("t1".to_string()),
                name: Some("add".to_string()),
                input: None,
            },
        });
        state.process(AnthropicStreamEvent::ContentBlockDelta {
            index: 0,
            delta: AnthropicDelta::InputJsonDelta {
                partial_json: "not json".to_string(),
            },
        });
        let events = state.process(AnthropicStreamEvent::ContentBlockStop { index: 0 });
        assert!(matches!(events.as_slice(), [StreamEvent::Error(_)]));

        let after = state.process(AnthropicStreamEvent::MessageStop);
        assert!(after.is_empty());
    }
}
