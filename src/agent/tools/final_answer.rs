use super::{check_filled, check_items, ToolArgs, ToolKind};
use crate::agent::context::{AgentState, ConversationContext};
use crate::error::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FinalAnswerStatus {
    Completed,
    Failed,
}

impl From<FinalAnswerStatus> for AgentState {
    fn from(status: FinalAnswerStatus) -> Self {
        match status {
            FinalAnswerStatus::Completed => AgentState::Completed,
            FinalAnswerStatus::Failed => AgentState::Failed,
        }
    }
}

/// Final answer closing the task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinalAnswerTool {
    /// Why task is now complete and how answer was verified
    pub reasoning: String,
    /// Summary of completed steps including verification
    #[schemars(length(min = 1, max = 5))]
    pub completed_steps: Vec<String>,
    /// Comprehensive final answer with EXACT factual details (dates, numbers, names)
    pub answer: String,
    /// Task completion status
    pub status: FinalAnswerStatus,
}

impl ToolArgs for FinalAnswerTool {
    const KIND: ToolKind = ToolKind::FinalAnswerTool;

    fn validate(&self) -> Result<()> {
        check_items(Self::KIND, "completed_steps", &self.completed_steps, 1, 5)?;
        check_filled(Self::KIND, "answer", &self.answer)
    }
}

impl FinalAnswerTool {
    /// Answer given directly as text, without a tool call
    pub fn direct(answer: impl Into<String>) -> Self {
        Self {
            reasoning: "Answered directly without a tool call".to_string(),
            completed_steps: vec!["Answered from the conversation".to_string()],
            answer: answer.into(),
            status: FinalAnswerStatus::Completed,
        }
    }

    pub(crate) fn execute(&self, ctx: &mut ConversationContext) -> Result<String> {
        ctx.finish(self.status.into(), self.answer.clone())?;
        Ok(serde_json::to_string_pretty(self)?)
    }
}
