//! Campus assistant agent built on schema-guided reasoning over an OpenAI-compatible API.

pub mod agent;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod schedule;
pub mod streaming;

pub use error::{CampusAgentError, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::agent::{
        AgentLimits, AgentOutcome, AgentService, AgentState, AgentVariant, ConversationContext,
        SgrAgent, ToolServices, Toolkit,
    };
    pub use crate::config::AgentSettings;
    pub use crate::error::{CampusAgentError, Result};
    pub use crate::knowledge::{InMemoryKnowledgeBase, KnowledgeBase, SearchHit};
    pub use crate::llm::gateways::OpenAIGateway;
    pub use crate::llm::{CompletionConfig, LlmBroker, LlmGateway, LlmMessage, MessageRole};
    pub use crate::schedule::{ScheduleService, ScheduleSource};
    pub use crate::streaming::{AgentStreamEvent, ChannelSink, NullSink, StreamSink};
}
