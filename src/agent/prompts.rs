//! Prompt templates keyed by name.
//!
//! Templates live in a YAML mapping of `name: template`. The default set is compiled into
//! the crate from `prompts/system_prompts.yaml`; a deployment can point at its own file
//! instead. Templates use `{{ name }}` placeholders, and a template that references a
//! placeholder its caller never supplies is rejected when the library is built rather than
//! on the first request.

use crate::agent::context::SourceData;
use crate::error::{CampusAgentError, Result};
use crate::llm::tools::ToolDescriptor;
use chrono::{DateTime, Local};
use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::debug;

const EMBEDDED_PROMPTS: &str = include_str!("../../prompts/system_prompts.yaml");

pub const SYSTEM_PROMPT: &str = "system_prompt";
pub const INITIAL_USER_REQUEST: &str = "initial_user_request";
pub const CLARIFICATION_RESPONSE: &str = "clarification_response";

const DATE_FORMAT: &str = "%d-%m-%Y %H:%M:%S";
const DATE_FORMAT_HINT: &str = "d-m-Y HH:MM:SS";

/// Placeholders each known template may use
fn supplied_vars(name: &str) -> Option<&'static [&'static str]> {
    match name {
        SYSTEM_PROMPT => Some(&["current_date", "date_format", "available_tools", "sources"]),
        INITIAL_USER_REQUEST => Some(&["task", "current_date"]),
        CLARIFICATION_RESPONSE => Some(&["answer"]),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<String, String>,
    placeholder: Regex,
}

impl PromptLibrary {
    /// Library built from the templates compiled into the crate
    pub fn embedded() -> Result<Self> {
        Self::from_yaml(EMBEDDED_PROMPTS)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            CampusAgentError::ConfigError(format!("Prompts file {} not readable: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded prompts file");
        Self::from_yaml(&yaml)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let templates: HashMap<String, String> = serde_yaml::from_str(yaml)
            .map_err(|e| CampusAgentError::ConfigError(format!("Invalid prompts YAML: {}", e)))?;

        let placeholder = Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
            .map_err(|e| CampusAgentError::ConfigError(e.to_string()))?;

        let library = Self { templates, placeholder };

        if !library.templates.contains_key(SYSTEM_PROMPT) {
            return Err(CampusAgentError::ConfigError(format!(
                "Prompt '{}' not found",
                SYSTEM_PROMPT
            )));
        }

        for (name, template) in &library.templates {
            let Some(allowed) = supplied_vars(name) else {
                continue;
            };
            let unknown: Vec<String> = library
                .placeholders(template)
                .into_iter()
                .filter(|p| !allowed.contains(&p.as_str()))
                .collect();
            if !unknown.is_empty() {
                return Err(CampusAgentError::ConfigError(format!(
                    "Prompt '{}' references unknown placeholders: {}",
                    name,
                    unknown.join(", ")
                )));
            }
        }

        Ok(library)
    }

    /// Distinct placeholder names used by `template`
    pub fn placeholders(&self, template: &str) -> BTreeSet<String> {
        self.placeholder
            .captures_iter(template)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Render a named template; every placeholder it uses must be in `vars`
    pub fn render(&self, name: &str, vars: &HashMap<&str, String>) -> Result<String> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| CampusAgentError::ConfigError(format!("Prompt '{}' not found", name)))?;

        let missing: Vec<String> = self
            .placeholders(template)
            .into_iter()
            .filter(|p| !vars.contains_key(p.as_str()))
            .collect();
        if !missing.is_empty() {
            return Err(CampusAgentError::ConfigError(format!(
                "Prompt '{}' is missing values for: {}",
                name,
                missing.join(", ")
            )));
        }

        let rendered = self
            .placeholder
            .replace_all(template, |caps: &Captures| vars.get(&caps[1]).cloned().unwrap_or_default());
        Ok(rendered.trim().to_string())
    }

    /// System message listing the offered tools and the sources collected so far
    pub fn system_prompt(&self, sources: &[SourceData], tools: &[ToolDescriptor]) -> Result<String> {
        self.system_prompt_at(Local::now(), sources, tools)
    }

    fn system_prompt_at(
        &self,
        now: DateTime<Local>,
        sources: &[SourceData],
        tools: &[ToolDescriptor],
    ) -> Result<String> {
        let available_tools = tools
            .iter()
            .map(|t| format!("- {}: {}", t.function.name, t.function.description))
            .collect::<Vec<_>>()
            .join("\n");

        let sources = if sources.is_empty() {
            "No sources collected yet.".to_string()
        } else {
            sources
                .iter()
                .map(|s| format!("[{}] {}", s.number, s.snippet))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let vars = HashMap::from([
            ("current_date", now.format(DATE_FORMAT).to_string()),
            ("date_format", DATE_FORMAT_HINT.to_string()),
            ("available_tools", available_tools),
            ("sources", sources),
        ]);
        self.render(SYSTEM_PROMPT, &vars)
    }

    /// Opening user turn for a new task; the bare task when no template is configured
    pub fn initial_user_request(&self, task: &str) -> Result<String> {
        if !self.has(INITIAL_USER_REQUEST) {
            return Ok(task.to_string());
        }
        let vars = HashMap::from([
            ("task", task.to_string()),
            ("current_date", Local::now().format(DATE_FORMAT).to_string()),
        ]);
        self.render(INITIAL_USER_REQUEST, &vars)
    }

    /// User turn carrying a clarification answer; the bare answer when no template is configured
    pub fn clarification_response(&self, answer: &str) -> Result<String> {
        if !self.has(CLARIFICATION_RESPONSE) {
            return Ok(answer.to_string());
        }
        let vars = HashMap::from([("answer", answer.to_string())]);
        self.render(CLARIFICATION_RESPONSE, &vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn tools() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::function("maptool", "Campus navigation", json!({"type": "object"})),
            ToolDescriptor::function("finalanswertool", "Finish the task", json!({"type": "object"})),
        ]
    }

    #[test]
    fn test_embedded_library_is_valid() {
        let library = PromptLibrary::embedded().unwrap();

        assert!(library.has(SYSTEM_PROMPT));
        assert!(library.has(INITIAL_USER_REQUEST));
        assert!(library.has(CLARIFICATION_RESPONSE));
    }

    #[test]
    fn test_system_prompt_renders_tools_date_and_sources() {
        let library = PromptLibrary::embedded().unwrap();
        let now = Local.with_ymd_and_hms(2025, 10, 23, 9, 5, 0).unwrap();
        let sources = vec![SourceData {
            number: 1,
            snippet: "Library hours".to_string(),
            full_content: "Library hours: 9-21".to_string(),
            char_count: 19,
        }];

        let prompt = library.system_prompt_at(now, &sources, &tools()).unwrap();

        assert!(prompt.contains("23-10-2025 09:05:00"));
        assert!(prompt.contains("- maptool: Campus navigation\n- finalanswertool: Finish the task"));
        assert!(prompt.contains("[1] Library hours"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_system_prompt_without_sources() {
        let library = PromptLibrary::embedded().unwrap();
        let prompt = library.system_prompt(&[], &tools()).unwrap();
        assert!(prompt.contains("No sources collected yet."));
    }

    #[test]
    fn test_unknown_placeholder_rejected_at_construction() {
        let err = PromptLibrary::from_yaml("system_prompt: 'Hello {{ user_name }}'").unwrap_err();
        assert!(matches!(err, CampusAgentError::ConfigError(ref m) if m.contains("user_name")));
    }

    #[test]
    fn test_missing_system_prompt_rejected() {
        let err = PromptLibrary::from_yaml("other: 'x'").unwrap_err();
        assert!(matches!(err, CampusAgentError::ConfigError(_)));
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        assert!(matches!(
            PromptLibrary::from_yaml("system_prompt: [unclosed"),
            Err(CampusAgentError::ConfigError(_))
        ));
    }

    #[test]
    fn test_missing_file_rejected() {
        let err = PromptLibrary::from_file("/nonexistent/prompts.yaml").unwrap_err();
        assert!(matches!(err, CampusAgentError::ConfigError(ref m) if m.contains("/nonexistent/prompts.yaml")));
    }

    #[test]
    fn test_from_file_and_render_custom_prompt() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "system_prompt: 'Tools: {{{{ available_tools }}}}'").unwrap();
        writeln!(file, "greeting: 'Hi {{{{ name }}}}!'").unwrap();

        let library = PromptLibrary::from_file(file.path()).unwrap();

        let vars = HashMap::from([("name", "Ann".to_string())]);
        assert_eq!(library.render("greeting", &vars).unwrap(), "Hi Ann!");
        assert!(library.render("greeting", &HashMap::new()).is_err());
        assert!(library.render("farewell", &vars).is_err());

        // No templates for turns: bare text is used
        assert_eq!(library.clarification_response("group 4236").unwrap(), "group 4236");
        assert_eq!(library.initial_user_request("task").unwrap(), "task");
    }

    #[test]
    fn test_clarification_response_template() {
        let library = PromptLibrary::embedded().unwrap();
        let text = library.clarification_response("Group 4236").unwrap();
        assert_eq!(text, "CLARIFICATIONS:\nGroup 4236");
    }
}
