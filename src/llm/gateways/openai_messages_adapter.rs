//! Adapter between internal LLM messages and the OpenAI chat-completion wire format.

use crate::error::{CampusAgentError, Result};
use crate::llm::models::{LlmMessage, LlmToolCall, MessageRole};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Adapt LLM messages to OpenAI format.
pub fn adapt_messages_to_openai(messages: &[LlmMessage]) -> Result<Vec<Value>> {
    let mut result = Vec::with_capacity(messages.len());

    for msg in messages {
        let openai_msg = match msg.role {
            MessageRole::System => json!({
                "role": "system",
                "content": msg.content.as_deref().unwrap_or("")
            }),
            MessageRole::User => json!({
                "role": "user",
                "content": msg.content.as_deref().unwrap_or("")
            }),
            MessageRole::Assistant => {
                let mut assistant_msg = json!({ "role": "assistant" });

                // OpenAI expects an explicit null content next to tool calls
                assistant_msg["content"] = match msg.content {
                    Some(ref content) => json!(content),
                    None => Value::Null,
                };

                if let Some(ref tool_calls) = msg.tool_calls {
                    let mut formatted_calls = Vec::with_capacity(tool_calls.len());
                    for tc in tool_calls {
                        formatted_calls.push(json!({
                            "id": tc.id.as_deref().unwrap_or(""),
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": serde_json::to_string(&tc.arguments)?
                            }
                        }));
                    }
                    assistant_msg["tool_calls"] = json!(formatted_calls);
                }

                assistant_msg
            }
            MessageRole::Tool => {
                let tool_call_id = msg.tool_call_id.as_deref().ok_or_else(|| {
                    CampusAgentError::GatewayError(
                        "Tool message is missing its tool_call_id".to_string(),
                    )
                })?;

                json!({
                    "role": "tool",
                    "content": msg.content.as_deref().unwrap_or(""),
                    "tool_call_id": tool_call_id
                })
            }
        };

        result.push(openai_msg);
    }

    Ok(result)
}

/// Parse the JSON-encoded argument string of a tool call.
///
/// An empty string is read as no arguments. Anything that is not a JSON object is a
/// protocol violation: the model claimed to call a tool but produced no usable payload.
pub fn parse_tool_arguments(tool_name: &str, raw: &str) -> Result<HashMap<String, Value>> {
    if raw.trim().is_empty() {
        return Ok(HashMap::new());
    }

    serde_json::from_str::<HashMap<String, Value>>(raw).map_err(|e| {
        CampusAgentError::ProtocolViolation(format!(
            "Malformed arguments for tool '{}': {}",
            tool_name, e
        ))
    })
}

/// Convert tool calls from OpenAI format to internal format.
pub fn convert_tool_calls(tool_calls: &[Value]) -> Result<Vec<LlmToolCall>> {
    let mut converted = Vec::with_capacity(tool_calls.len());

    for tc in tool_calls {
        let name = tc["function"]["name"].as_str().ok_or_else(|| {
            CampusAgentError::ProtocolViolation("Tool call without a function name".to_string())
        })?;
        let arguments = parse_tool_arguments(name, tc["function"]["arguments"].as_str().unwrap_or(""))?;

        converted.push(LlmToolCall {
            id: tc["id"].as_str().map(String::from),
            name: name.to_string(),
            arguments,
        });
    }

    Ok(converted)
}
