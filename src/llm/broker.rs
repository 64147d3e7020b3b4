use crate::error::{CampusAgentError, Result};
use crate::llm::gateway::{CompletionConfig, LlmGateway, StreamChunk};
use crate::llm::models::{LlmGatewayResponse, LlmMessage};
use crate::llm::tools::{parameters_schema, ToolChoice, ToolDescriptor};
use crate::streaming::StreamSink;
use futures::stream::StreamExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

/// Main interface for LLM interactions: a model name bound to a gateway
#[derive(Clone)]
pub struct LlmBroker {
    model: String,
    gateway: Arc<dyn LlmGateway>,
}

impl LlmBroker {
    /// Create a new LLM broker
    pub fn new(model: impl Into<String>, gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            model: model.into(),
            gateway,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model to act through one of `tools`, honoring `tool_choice`.
    ///
    /// Tool calls are returned to the caller, never executed here. With `config.stream`
    /// set, content tokens are forwarded to `sink` as they arrive; otherwise the whole
    /// text content is forwarded once the response is complete.
    pub async fn generate_with_tools(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolDescriptor],
        tool_choice: &ToolChoice,
        config: &CompletionConfig,
        sink: &dyn StreamSink,
    ) -> Result<LlmGatewayResponse> {
        debug!(
            model = %self.model,
            message_count = messages.len(),
            tool_count = tools.len(),
            tool_choice = ?tool_choice,
            "Requesting tool selection"
        );

        if !config.stream {
            let response = self
                .gateway
                .complete(&self.model, messages, Some(tools), Some(tool_choice), config)
                .await?;
            if let Some(content) = response.content.as_deref().filter(|c| !c.is_empty()) {
                sink.content(content);
            }
            return Ok(response);
        }

        let mut stream =
            self.gateway
                .complete_stream(&self.model, messages, Some(tools), Some(tool_choice), config);
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        while let Some(chunk) = stream.next().await {
            match chunk? {
                StreamChunk::Content(text) => {
                    sink.content(&text);
                    content.push_str(&text);
                }
                StreamChunk::ToolCalls(calls) => tool_calls.extend(calls),
            }
        }

        info!(tool_calls = tool_calls.len(), content_len = content.len(), "Stream completed");

        Ok(LlmGatewayResponse {
            content: (!content.is_empty()).then_some(content),
            tool_calls,
        })
    }

    /// Generate structured object response from LLM
    pub async fn generate_object<T>(
        &self,
        messages: &[LlmMessage],
        config: &CompletionConfig,
    ) -> Result<T>
    where
        T: DeserializeOwned + schemars::JsonSchema + Send,
    {
        let schema = parameters_schema::<T>()?;

        let json_response =
            self.gateway.complete_json(&self.model, messages, schema, config).await?;

        serde_json::from_value(json_response).map_err(|e| {
            CampusAgentError::ValidationError(format!("Structured output does not match schema: {}", e))
        })
    }

    /// Calculate an embedding vector with the gateway's default embeddings model
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.gateway.calculate_embeddings(text, None).await
    }
}
