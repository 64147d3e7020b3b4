//! Error types and result aliases for the campus agent.
//!
//! This module defines the core error type [`CampusAgentError`] and the [`Result`] type
//! alias used throughout the crate. Configuration errors surface at construction time,
//! validation and protocol errors surface from the agent loop, and errors from external
//! collaborators (model API, knowledge base, schedule site) are propagated unchanged.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CampusAgentError {
    #[error("LLM gateway error: {0}")]
    GatewayError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Tool validation error: {0}")]
    ValidationError(String),

    #[error("Model protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Agent error: {0}")]
    AgentError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, CampusAgentError>;
