use crate::error::Result;
use crate::llm::models::{LlmGatewayResponse, LlmMessage, LlmToolCall};
use crate::llm::tools::{ToolChoice, ToolDescriptor};
use async_trait::async_trait;
use futures::stream::Stream;
use serde_json::Value;
use std::pin::Pin;

/// Configuration for LLM completion
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub temperature: f32,
    pub max_tokens: usize,
    /// Deliver tokens incrementally while the response is produced
    pub stream: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_tokens: 8000,
            stream: true,
        }
    }
}

/// A piece of a streamed completion
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Content(String),
    ToolCalls(Vec<LlmToolCall>),
}

/// Abstract interface for LLM providers
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Complete an LLM request, optionally offering tools under a tool choice policy
    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        tools: Option<&[ToolDescriptor]>,
        tool_choice: Option<&ToolChoice>,
        config: &CompletionConfig,
    ) -> Result<LlmGatewayResponse>;

    /// Complete an LLM request with structured JSON response
    async fn complete_json(
        &self,
        model: &str,
        messages: &[LlmMessage],
        schema: Value,
        config: &CompletionConfig,
    ) -> Result<Value>;

    /// Calculate embeddings for text
    async fn calculate_embeddings(&self, text: &str, model: Option<&str>) -> Result<Vec<f32>>;

    /// Stream an LLM completion; tool calls arrive as one final `ToolCalls` chunk
    fn complete_stream<'a>(
        &'a self,
        model: &'a str,
        messages: &'a [LlmMessage],
        tools: Option<&'a [ToolDescriptor]>,
        tool_choice: Option<&'a ToolChoice>,
        config: &'a CompletionConfig,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>>;
}
