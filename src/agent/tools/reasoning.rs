use super::{check_chars, check_items, ToolArgs, ToolKind};
use crate::error::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Self-assessment of research progress before the next action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReasoningTool {
    /// Step-by-step reasoning (brief, 1 sentence each)
    #[schemars(length(min = 2, max = 3))]
    pub reasoning_steps: Vec<String>,
    /// Current research situation (2-3 sentences MAX)
    #[schemars(length(max = 300))]
    pub current_situation: String,
    /// Status of current plan (1 sentence)
    #[schemars(length(max = 150))]
    pub plan_status: String,
    /// Sufficient data collected for a comprehensive answer?
    #[serde(default)]
    pub enough_data: bool,
    /// 1-3 remaining steps (brief, action-oriented)
    #[schemars(length(min = 1, max = 3))]
    pub remaining_steps: Vec<String>,
    /// Is the research task finished?
    pub task_completed: bool,
}

impl ToolArgs for ReasoningTool {
    const KIND: ToolKind = ToolKind::ReasoningTool;

    fn validate(&self) -> Result<()> {
        check_items(Self::KIND, "reasoning_steps", &self.reasoning_steps, 2, 3)?;
        check_chars(Self::KIND, "current_situation", &self.current_situation, 300)?;
        check_chars(Self::KIND, "plan_status", &self.plan_status, 150)?;
        check_items(Self::KIND, "remaining_steps", &self.remaining_steps, 1, 3)
    }
}

impl ReasoningTool {
    pub(crate) fn execute(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
