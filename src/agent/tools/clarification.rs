use super::{check_chars, check_items, ToolArgs, ToolKind};
use crate::agent::context::{AgentState, ConversationContext};
use crate::error::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Questions for the user when the request cannot be resolved as stated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClarificationTool {
    /// Why clarification is needed (1-2 sentences MAX)
    #[schemars(length(max = 200))]
    pub reasoning: String,
    /// List of unclear terms (brief, 1-3 words each)
    #[schemars(length(min = 1, max = 3))]
    pub unclear_terms: Vec<String>,
    /// Possible interpretations (short, 1 sentence each)
    #[schemars(length(min = 2, max = 3))]
    pub assumptions: Vec<String>,
    /// 3 specific clarifying questions (short and direct)
    #[schemars(length(min = 3, max = 3))]
    pub questions: Vec<String>,
}

impl ToolArgs for ClarificationTool {
    const KIND: ToolKind = ToolKind::ClarificationTool;

    fn validate(&self) -> Result<()> {
        check_chars(Self::KIND, "reasoning", &self.reasoning, 200)?;
        check_items(Self::KIND, "unclear_terms", &self.unclear_terms, 1, 3)?;
        check_items(Self::KIND, "assumptions", &self.assumptions, 2, 3)?;
        check_items(Self::KIND, "questions", &self.questions, 3, 3)
    }
}

impl ClarificationTool {
    pub(crate) fn execute(&self, ctx: &mut ConversationContext) -> Result<String> {
        ctx.transition(AgentState::WaitingForClarification)?;
        ctx.clarifications_used += 1;
        Ok(self.questions.join("\n"))
    }
}
