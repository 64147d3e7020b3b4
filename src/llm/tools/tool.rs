use crate::error::Result;
use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// JSON schema of `T` in the self-contained form function-calling APIs accept.
///
/// Subschemas are inlined so no `definitions` or `$ref` remain; the root `$schema` and
/// `title` keys are dropped.
pub fn parameters_schema<T: JsonSchema>() -> Result<Value> {
    let generator = SchemaSettings::draft07()
        .with(|s| {
            s.inline_subschemas = true;
        })
        .into_generator();
    let mut value = serde_json::to_value(generator.into_root_schema_for::<T>())?;

    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("definitions");
    }

    Ok(value)
}

/// Descriptor for tool function parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub r#type: String,
    pub function: FunctionDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDescriptor {
    /// Build a function-type descriptor
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            r#type: "function".to_string(),
            function: FunctionDescriptor {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Constraint on whether, and which, tool the model must call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model may answer without calling a tool
    Auto,
    /// The model must call exactly one of the offered tools
    Required,
    /// The model must call the named tool
    Function(String),
}

impl ToolChoice {
    /// Whether a response without any tool call violates this policy
    pub fn requires_call(&self) -> bool {
        !matches!(self, ToolChoice::Auto)
    }

    /// Wire form used by OpenAI-compatible chat completion endpoints
    pub fn to_openai(&self) -> Value {
        match self {
            ToolChoice::Auto => json!("auto"),
            ToolChoice::Required => json!("required"),
            ToolChoice::Function(name) => json!({
                "type": "function",
                "function": { "name": name }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_descriptor_serialization() {
        let descriptor = ToolDescriptor::function(
            "maptool",
            "Campus navigation",
            json!({"type": "object", "properties": {"query_type": {"type": "string"}}}),
        );

        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains("\"type\":\"function\""));
        assert!(json.contains("maptool"));
        assert!(json.contains("Campus navigation"));
        assert_eq!(descriptor.name(), "maptool");
    }

    #[test]
    fn test_tool_descriptor_deserialization() {
        let json = r#"{
            "type": "function",
            "function": {
                "name": "scheduletool",
                "description": "Class schedules",
                "parameters": {"type": "object"}
            }
        }"#;

        let descriptor: ToolDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.r#type, "function");
        assert_eq!(descriptor.function.name, "scheduletool");
    }

    #[test]
    fn test_tool_choice_wire_format() {
        assert_eq!(ToolChoice::Auto.to_openai(), json!("auto"));
        assert_eq!(ToolChoice::Required.to_openai(), json!("required"));
        assert_eq!(
            ToolChoice::Function("reasoningtool".to_string()).to_openai(),
            json!({"type": "function", "function": {"name": "reasoningtool"}})
        );
    }

    #[derive(schemars::JsonSchema)]
    #[allow(dead_code)]
    enum Level {
        Low,
        High,
    }

    #[derive(schemars::JsonSchema)]
    #[allow(dead_code)]
    struct Probe {
        /// Things to check
        #[schemars(length(min = 1, max = 3))]
        items: Vec<String>,
        level: Level,
    }

    #[test]
    fn test_parameters_schema_is_self_contained() {
        let schema = parameters_schema::<Probe>().unwrap();

        assert_eq!(schema["type"], "object");
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("definitions").is_none());
        assert_eq!(schema["properties"]["items"]["minItems"], 1);
        assert_eq!(schema["properties"]["items"]["maxItems"], 3);
        assert_eq!(schema["properties"]["items"]["description"], "Things to check");
        assert!(schema["properties"]["level"]["enum"].is_array());
    }

    #[test]
    fn test_tool_choice_requires_call() {
        assert!(!ToolChoice::Auto.requires_call());
        assert!(ToolChoice::Required.requires_call());
        assert!(ToolChoice::Function("x".to_string()).requires_call());
    }
}
