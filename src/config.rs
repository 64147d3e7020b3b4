//! Runtime settings read from the environment.
//!
//! A `.env` file in the working directory is loaded first when present. Every setting
//! has a default except the API key, which falls back to empty for local endpoints that
//! do not check it.

use crate::agent::prompts::PromptLibrary;
use crate::agent::registry::AgentLimits;
use crate::agent::service::{AgentService, DEFAULT_HISTORY_TURNS};
use crate::agent::sgr_agent::{AgentVariant, SgrAgent};
use crate::agent::tools::ToolServices;
use crate::error::{CampusAgentError, Result};
use crate::llm::gateway::CompletionConfig;
use crate::llm::gateways::{OpenAIConfig, OpenAIGateway};
use crate::llm::LlmBroker;
use crate::schedule::ScheduleService;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const GATEWAY_TIMEOUT_SECONDS: u64 = 120;

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub openai: OpenAIConfig,
    pub model: String,
    pub completion: CompletionConfig,
    pub limits: AgentLimits,
    /// Earlier question/answer turns replayed into each new task
    pub history_turns: usize,
    pub prompts_file: Option<PathBuf>,
    pub schedule_base_url: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            openai: OpenAIConfig {
                api_key: String::new(),
                base_url: DEFAULT_BASE_URL.to_string(),
                timeout: Some(Duration::from_secs(GATEWAY_TIMEOUT_SECONDS)),
            },
            model: DEFAULT_MODEL.to_string(),
            completion: CompletionConfig::default(),
            limits: AgentLimits::default(),
            history_turns: DEFAULT_HISTORY_TURNS,
            prompts_file: None,
            schedule_base_url: crate::schedule::DEFAULT_BASE_URL.to_string(),
        }
    }
}

fn parse_var<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|e| CampusAgentError::ConfigError(format!("{}={} is invalid: {}", key, value, e))),
    }
}

fn parse_flag(key: &str, raw: Option<String>, default: bool) -> Result<bool> {
    let Some(value) = raw.map(|v| v.trim().to_lowercase()).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    match value.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CampusAgentError::ConfigError(format!(
            "{}={} is not a boolean",
            key, value
        ))),
    }
}

impl AgentSettings {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        if dotenv::dotenv().is_ok() {
            debug!("Loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let completion = CompletionConfig {
            temperature: parse_var("AGENT_TEMPERATURE", lookup("AGENT_TEMPERATURE"), defaults.completion.temperature)?,
            max_tokens: parse_var("AGENT_MAX_TOKENS", lookup("AGENT_MAX_TOKENS"), defaults.completion.max_tokens)?,
            stream: parse_flag("AGENT_STREAMING", lookup("AGENT_STREAMING"), defaults.completion.stream)?,
        };
        if !(0.0..=2.0).contains(&completion.temperature) {
            return Err(CampusAgentError::ConfigError(format!(
                "AGENT_TEMPERATURE must be between 0 and 2, got {}",
                completion.temperature
            )));
        }

        let limits = AgentLimits {
            max_iterations: parse_var(
                "AGENT_MAX_ITERATIONS",
                lookup("AGENT_MAX_ITERATIONS"),
                defaults.limits.max_iterations,
            )?,
            max_clarifications: parse_var(
                "AGENT_MAX_CLARIFICATIONS",
                lookup("AGENT_MAX_CLARIFICATIONS"),
                defaults.limits.max_clarifications,
            )?,
        };

        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            openai: OpenAIConfig {
                api_key: non_empty("OPENAI_API_KEY").unwrap_or_default(),
                base_url: non_empty("OPENAI_API_ENDPOINT").unwrap_or(defaults.openai.base_url),
                timeout: defaults.openai.timeout,
            },
            model: non_empty("AGENT_MODEL").unwrap_or(defaults.model),
            completion,
            limits,
            history_turns: parse_var("AGENT_HISTORY_TURNS", lookup("AGENT_HISTORY_TURNS"), defaults.history_turns)?,
            prompts_file: non_empty("PROMPTS_FILE").map(PathBuf::from),
            schedule_base_url: non_empty("SCHEDULE_BASE_URL").unwrap_or(defaults.schedule_base_url),
        })
    }

    /// Prompt library from `prompts_file`, or the embedded templates
    pub fn prompts(&self) -> Result<PromptLibrary> {
        match &self.prompts_file {
            Some(path) => PromptLibrary::from_file(path),
            None => PromptLibrary::embedded(),
        }
    }

    pub fn broker(&self) -> Result<LlmBroker> {
        let gateway = OpenAIGateway::with_config(self.openai.clone())?;
        Ok(LlmBroker::new(self.model.clone(), Arc::new(gateway)))
    }

    pub fn schedule_service(&self) -> Result<ScheduleService> {
        ScheduleService::new(self.schedule_base_url.clone())
    }

    /// Agent wired with these settings and the given tool services
    pub fn agent(&self, variant: AgentVariant, services: ToolServices) -> Result<SgrAgent> {
        SgrAgent::builder(self.broker()?)
            .prompts(self.prompts()?)
            .services(services)
            .limits(self.limits)
            .variant(variant)
            .config(self.completion.clone())
            .build()
    }

    /// Session service over [`agent`](Self::agent)
    pub fn service(&self, variant: AgentVariant, services: ToolServices) -> Result<AgentService> {
        Ok(AgentService::new(self.agent(variant, services)?).with_history_turns(self.history_turns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn settings(vars: &[(&str, &str)]) -> Result<AgentSettings> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AgentSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();

        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.openai.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.limits, AgentLimits::default());
        assert_eq!(settings.history_turns, DEFAULT_HISTORY_TURNS);
        assert!(settings.completion.stream);
        assert!(settings.prompts_file.is_none());
        assert_eq!(settings.schedule_base_url, "https://guap.ru/rasp");
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_API_ENDPOINT", "http://localhost:8000/v1"),
            ("AGENT_MODEL", "qwen2.5"),
            ("AGENT_MAX_TOKENS", "2048"),
            ("AGENT_TEMPERATURE", "0.1"),
            ("AGENT_STREAMING", "false"),
            ("AGENT_MAX_ITERATIONS", "5"),
            ("AGENT_MAX_CLARIFICATIONS", "2"),
            ("AGENT_HISTORY_TURNS", "0"),
            ("SCHEDULE_BASE_URL", "http://localhost/rasp"),
        ])
        .unwrap();

        assert_eq!(settings.openai.api_key, "sk-test");
        assert_eq!(settings.openai.base_url, "http://localhost:8000/v1");
        assert_eq!(settings.model, "qwen2.5");
        assert_eq!(settings.completion.max_tokens, 2048);
        assert!((settings.completion.temperature - 0.1).abs() < f32::EPSILON);
        assert!(!settings.completion.stream);
        assert_eq!(settings.limits.max_iterations, 5);
        assert_eq!(settings.limits.max_clarifications, 2);
        assert_eq!(settings.history_turns, 0);
        assert_eq!(settings.schedule_base_url, "http://localhost/rasp");
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let err = settings(&[("AGENT_MAX_ITERATIONS", "ten")]).unwrap_err();
        assert!(matches!(err, CampusAgentError::ConfigError(ref m) if m.contains("AGENT_MAX_ITERATIONS")));

        assert!(settings(&[("AGENT_TEMPERATURE", "hot")]).is_err());
        assert!(settings(&[("AGENT_TEMPERATURE", "3.5")]).is_err());
        assert!(settings(&[("AGENT_STREAMING", "maybe")]).is_err());
        assert!(settings(&[("AGENT_HISTORY_TURNS", "-1")]).is_err());
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let settings = settings(&[("AGENT_MODEL", "  "), ("AGENT_MAX_TOKENS", "")]).unwrap();
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.completion.max_tokens, 8000);
    }

    #[test]
    fn test_prompts_file_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "system_prompt: 'Custom {{{{ available_tools }}}}'").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let settings = settings(&[("PROMPTS_FILE", path.as_str())]).unwrap();
        let prompts = settings.prompts().unwrap();
        assert!(!prompts.has("initial_user_request"));

        let missing = settings_with_missing_prompts();
        assert!(matches!(missing.prompts(), Err(CampusAgentError::ConfigError(_))));
    }

    fn settings_with_missing_prompts() -> AgentSettings {
        AgentSettings {
            prompts_file: Some(PathBuf::from("/nonexistent/prompts.yaml")),
            ..AgentSettings::default()
        }
    }

    #[test]
    fn test_agent_wiring() {
        let settings = settings(&[("AGENT_MAX_ITERATIONS", "4")]).unwrap();
        let agent = settings.agent(AgentVariant::sgr_tools(), ToolServices::default()).unwrap();

        assert_eq!(agent.limits().max_iterations, 4);
        assert_eq!(agent.variant().name, "sgr_tools_agent");

        let service = settings.service(AgentVariant::university(), ToolServices::default()).unwrap();
        assert_eq!(service.agent().limits().max_iterations, 4);
        assert_eq!(service.session_count(), 0);
    }
}
