//! OpenAI-compatible gateway for LLM interactions.
//!
//! This module provides a gateway for any endpoint speaking the OpenAI chat-completion
//! protocol, including tool calling with an explicit tool choice, SSE streaming,
//! structured output and embeddings.

use crate::error::{CampusAgentError, Result};
use crate::llm::gateway::{CompletionConfig, LlmGateway, StreamChunk};
use crate::llm::gateways::openai_messages_adapter::{
    adapt_messages_to_openai, convert_tool_calls, parse_tool_arguments,
};
use crate::llm::models::{LlmGatewayResponse, LlmMessage, LlmToolCall};
use crate::llm::tools::{ToolChoice, ToolDescriptor};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDINGS_MODEL: &str = "text-embedding-3-small";

/// Configuration for connecting to an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            base_url: std::env::var("OPENAI_API_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: Some(Duration::from_secs(120)),
        }
    }
}

/// Gateway for OpenAI-compatible LLM services.
pub struct OpenAIGateway {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIGateway {
    /// Create a new gateway with configuration taken from the environment.
    pub fn new() -> Result<Self> {
        Self::with_config(OpenAIConfig::default())
    }

    /// Create a new gateway with custom configuration.
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(Self { client, config })
    }

    /// Create gateway with custom API key and base URL.
    pub fn with_api_key_and_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        Self::with_config(OpenAIConfig {
            api_key: api_key.into(),
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Assemble a chat-completion request body.
    fn build_request_body(
        &self,
        model: &str,
        messages: &[LlmMessage],
        tools: Option<&[ToolDescriptor]>,
        tool_choice: Option<&ToolChoice>,
        config: &CompletionConfig,
        stream: bool,
    ) -> Result<Value> {
        let mut body = json!({
            "model": model,
            "messages": adapt_messages_to_openai(messages)?,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
        });

        if stream {
            body["stream"] = json!(true);
        }

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            body["tools"] = serde_json::to_value(tools)?;
            if let Some(choice) = tool_choice {
                body["tool_choice"] = choice.to_openai();
            }
        }

        Ok(body)
    }

    async fn post_chat(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CampusAgentError::GatewayError(format!(
                "OpenAI API error: {} - {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmGateway for OpenAIGateway {
    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        tools: Option<&[ToolDescriptor]>,
        tool_choice: Option<&ToolChoice>,
        config: &CompletionConfig,
    ) -> Result<LlmGatewayResponse> {
        info!("Delegating to OpenAI for completion");
        debug!(model = model, message_count = messages.len(), "Completion request");

        let body = self.build_request_body(model, messages, tools, tool_choice, config, false)?;
        let response_body: Value = self.post_chat(&body).await?.json().await?;

        let message = &response_body["choices"][0]["message"];
        if message.is_null() {
            return Err(CampusAgentError::GatewayError("No choices in response".to_string()));
        }

        let content = message["content"].as_str().map(String::from);
        let tool_calls = match message["tool_calls"].as_array() {
            Some(calls) => convert_tool_calls(calls)?,
            None => vec![],
        };

        Ok(LlmGatewayResponse {
            content,
            tool_calls,
        })
    }

    async fn complete_json(
        &self,
        model: &str,
        messages: &[LlmMessage],
        schema: Value,
        config: &CompletionConfig,
    ) -> Result<Value> {
        info!("Requesting structured output from OpenAI");

        let mut body = self.build_request_body(model, messages, None, None, config, false)?;
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": "response",
                "schema": schema
            }
        });

        let response_body: Value = self.post_chat(&body).await?.json().await?;
        let content = response_body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| CampusAgentError::GatewayError("No content in response".to_string()))?;

        let json_value: Value = serde_json::from_str(content).map_err(|e| {
            CampusAgentError::ProtocolViolation(format!("Structured output is not JSON: {}", e))
        })?;

        Ok(json_value)
    }

    async fn calculate_embeddings(&self, text: &str, model: Option<&str>) -> Result<Vec<f32>> {
        let model = model.unwrap_or(DEFAULT_EMBEDDINGS_MODEL);
        debug!("Calculating embeddings with model: {}", model);

        let response = self
            .client
            .post(self.endpoint("embeddings"))
            .bearer_auth(&self.config.api_key)
            .json(&json!({ "model": model, "input": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CampusAgentError::GatewayError(format!(
                "Embeddings API error: {}",
                response.status()
            )));
        }

        let response_body: Value = response.json().await?;

        let embedding = response_body["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| CampusAgentError::GatewayError("Invalid embeddings response".to_string()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        Ok(embedding)
    }

    fn complete_stream<'a>(
        &'a self,
        model: &'a str,
        messages: &'a [LlmMessage],
        tools: Option<&'a [ToolDescriptor]>,
        tool_choice: Option<&'a ToolChoice>,
        config: &'a CompletionConfig,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
        Box::pin(async_stream::stream! {
            info!("Starting OpenAI streaming completion");
            debug!(model = model, message_count = messages.len(), "Streaming request");

            let body = match self.build_request_body(model, messages, tools, tool_choice, config, true) {
                Ok(b) => b,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let response = match self.post_chat(&body).await {
                Ok(r) => r,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            let mut accumulator = ToolCallAccumulator::default();

            while let Some(chunk_result) = stream.next().await {
                let bytes = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(e.into());
                        return;
                    }
                };
                buffer.extend_from_slice(&bytes);

                // Process complete SSE lines; a line may span several network chunks
                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&raw).trim().to_string();

                    let Some(data) = line.strip_prefix("data:").map(str::trim) else {
                        continue;
                    };

                    if data == "[DONE]" {
                        if !accumulator.is_empty() {
                            match accumulator.finish() {
                                Ok(calls) => yield Ok(StreamChunk::ToolCalls(calls)),
                                Err(e) => {
                                    yield Err(e);
                                    return;
                                }
                            }
                        }
                        continue;
                    }

                    let json = match serde_json::from_str::<Value>(data) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Failed to parse streaming chunk: {}", e);
                            continue;
                        }
                    };

                    let Some(choice) = json["choices"].as_array().and_then(|c| c.first()) else {
                        continue;
                    };
                    let delta = &choice["delta"];

                    if let Some(content) = delta["content"].as_str() {
                        if !content.is_empty() {
                            yield Ok(StreamChunk::Content(content.to_string()));
                        }
                    }

                    if let Some(tool_calls) = delta["tool_calls"].as_array() {
                        accumulator.absorb(tool_calls);
                    }

                    if choice["finish_reason"].as_str() == Some("tool_calls") && !accumulator.is_empty() {
                        match accumulator.finish() {
                            Ok(calls) => yield Ok(StreamChunk::ToolCalls(calls)),
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        }
                    }
                }
            }

            // Some compatible servers close the stream without [DONE]
            if !accumulator.is_empty() {
                match accumulator.finish() {
                    Ok(calls) => yield Ok(StreamChunk::ToolCalls(calls)),
                    Err(e) => yield Err(e),
                }
            }
        })
    }
}

#[derive(Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Accumulates streamed tool-call deltas keyed by their index.
///
/// Deltas without an index belong to the latest call unless they carry a new id.
#[derive(Default)]
struct ToolCallAccumulator {
    calls: BTreeMap<u64, PartialToolCall>,
    latest: Option<u64>,
}

impl ToolCallAccumulator {
    fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn slot_for(&self, delta: &Value) -> u64 {
        if let Some(index) = delta["index"].as_u64() {
            return index;
        }
        let Some(latest) = self.latest else {
            return 0;
        };
        let latest_id = self.calls.get(&latest).and_then(|c| c.id.as_deref());
        match (delta["id"].as_str(), latest_id) {
            (Some(id), Some(current)) if id != current => {
                self.calls.keys().next_back().map_or(0, |last| last + 1)
            }
            _ => latest,
        }
    }

    fn absorb(&mut self, deltas: &[Value]) {
        for tc in deltas {
            let index = self.slot_for(tc);
            self.latest = Some(index);
            let acc = self.calls.entry(index).or_default();

            if let Some(id) = tc["id"].as_str() {
                acc.id = Some(id.to_string());
            }
            if let Some(name) = tc["function"]["name"].as_str() {
                acc.name = Some(name.to_string());
            }
            if let Some(args) = tc["function"]["arguments"].as_str() {
                acc.arguments.push_str(args);
            }
        }
    }

    /// Drain the accumulated calls, failing on a nameless call or unparseable arguments.
    fn finish(&mut self) -> Result<Vec<LlmToolCall>> {
        self.latest = None;
        let calls = std::mem::take(&mut self.calls);
        calls
            .into_values()
            .map(|acc| {
                let name = acc.name.ok_or_else(|| {
                    CampusAgentError::ProtocolViolation(
                        "Streamed tool call without a function name".to_string(),
                    )
                })?;
                let arguments = parse_tool_arguments(&name, &acc.arguments)?;
                Ok(LlmToolCall {
                    id: acc.id,
                    name,
                    arguments,
                })
            })
            .collect()
    }
}
