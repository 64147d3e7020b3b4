//! Mutable state threaded through one agent task.
//!
//! A [`ConversationContext`] is created once per incoming task and is owned by exactly one
//! running loop at a time. The conversation log is append-only: every model turn and every
//! tool result is pushed through the helpers on this type and never edited afterwards.

use crate::error::{CampusAgentError, Result};
use crate::llm::models::{LlmMessage, LlmToolCall};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle state of an agent task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Inited,
    Researching,
    WaitingForClarification,
    Completed,
    Error,
    Failed,
}

impl AgentState {
    /// Whether this state is absorbing
    pub fn is_finished(self) -> bool {
        matches!(self, AgentState::Completed | AgentState::Failed | AgentState::Error)
    }

    fn can_move_to(self, next: AgentState) -> bool {
        use AgentState::*;
        match (self, next) {
            (Inited, Researching) => true,
            (Researching, WaitingForClarification | Completed | Failed | Error) => true,
            (WaitingForClarification, Researching | Error) => true,
            _ => false,
        }
    }
}

/// A citation collected while researching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    pub number: usize,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub full_content: String,
    #[serde(default)]
    pub char_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub task_id: Uuid,
    task: String,
    conversation: Vec<LlmMessage>,
    pub iteration: usize,
    pub clarifications_used: usize,
    sources: Vec<SourceData>,
    state: AgentState,
    execution_result: Option<String>,
}

impl ConversationContext {
    /// Create a fresh context whose log starts with the task as a user turn
    pub fn new(task: impl Into<String>) -> Self {
        let task = task.into();
        Self::with_opening(task.clone(), task)
    }

    /// Create a fresh context whose first user turn is `opening` rather than the bare task
    pub fn with_opening(task: impl Into<String>, opening: impl Into<String>) -> Self {
        Self::with_history(task, Vec::new(), opening)
    }

    /// Create a fresh context that replays earlier turns of the session before `opening`
    pub fn with_history(task: impl Into<String>, prior: Vec<LlmMessage>, opening: impl Into<String>) -> Self {
        let mut conversation = prior;
        conversation.push(LlmMessage::user(opening));
        Self {
            task_id: Uuid::new_v4(),
            task: task.into(),
            conversation,
            iteration: 0,
            clarifications_used: 0,
            sources: Vec::new(),
            state: AgentState::Inited,
            execution_result: None,
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn conversation(&self) -> &[LlmMessage] {
        &self.conversation
    }

    pub fn sources(&self) -> &[SourceData] {
        &self.sources
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn execution_result(&self) -> Option<&str> {
        self.execution_result.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Move to `next`, rejecting backwards or out-of-finish transitions
    pub fn transition(&mut self, next: AgentState) -> Result<()> {
        if self.state == next {
            return Ok(());
        }
        if !self.state.can_move_to(next) {
            return Err(CampusAgentError::AgentError(format!(
                "Invalid state transition {:?} -> {:?}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Record the terminal outcome; allowed exactly once
    pub fn finish(&mut self, state: AgentState, result: impl Into<String>) -> Result<()> {
        if !matches!(state, AgentState::Completed | AgentState::Failed) {
            return Err(CampusAgentError::AgentError(format!(
                "{:?} is not a terminal outcome",
                state
            )));
        }
        if self.execution_result.is_some() {
            return Err(CampusAgentError::AgentError(
                "Execution result already set".to_string(),
            ));
        }
        self.transition(state)?;
        self.execution_result = Some(result.into());
        Ok(())
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.conversation.push(LlmMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.conversation.push(LlmMessage::assistant(content));
    }

    pub fn push_tool_call(&mut self, call: LlmToolCall) {
        self.conversation.push(LlmMessage::assistant_tool_call(call));
    }

    pub fn push_tool_result(&mut self, tool_call_id: impl Into<String>, content: impl Into<String>) {
        self.conversation.push(LlmMessage::tool_result(tool_call_id, content));
    }

    /// Append a citation and return its number
    pub fn add_source(&mut self, snippet: impl Into<String>, full_content: impl Into<String>) -> usize {
        let full_content = full_content.into();
        let number = self.sources.len() + 1;
        self.sources.push(SourceData {
            number,
            snippet: snippet.into(),
            char_count: full_content.chars().count(),
            full_content,
        });
        number
    }

    /// Resume a task waiting for clarification with the user's answer
    pub fn provide_clarification(&mut self, answer: impl Into<String>) -> Result<()> {
        if self.state != AgentState::WaitingForClarification {
            return Err(CampusAgentError::AgentError(format!(
                "Context is not waiting for clarification (state: {:?})",
                self.state
            )));
        }
        self.push_user(answer);
        self.transition(AgentState::Researching)
    }

    /// Plain structured record for external storage
    pub fn to_record(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_record(record: Value) -> Result<Self> {
        Ok(serde_json::from_value(record)?)
    }
}
