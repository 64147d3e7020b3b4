//! Schema-guided reasoning agent for student questions.
//!
//! # Components
//!
//! - [`ConversationContext`] - per-task state machine and append-only message log
//! - [`AgentTool`] - the closed set of structured tools and their execution
//! - [`Toolkit`] - configured tools and the offered-set policy
//! - [`PromptLibrary`] - YAML prompt templates
//! - [`SgrAgent`] - the bounded reasoning / selection / execution loop
//! - [`AgentService`] - per-user sessions with clarification resume

pub mod context;
pub mod prompts;
pub mod registry;
pub mod service;
pub mod sgr_agent;
pub mod tools;

pub use context::{AgentState, ConversationContext, SourceData};
pub use prompts::PromptLibrary;
pub use registry::{AgentLimits, Toolkit};
pub use service::AgentService;
pub use sgr_agent::{AgentOutcome, AgentVariant, ReasoningMode, SgrAgent, SgrAgentBuilder};
pub use tools::{AgentTool, ToolKind, ToolServices};
