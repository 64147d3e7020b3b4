use super::{check_filled, check_items, dump_without, ToolArgs, ToolKind};
use crate::error::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Research plan for the request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratePlanTool {
    /// Justification for the research approach
    pub reasoning: String,
    /// Primary research objective
    pub research_goal: String,
    /// List of 3-4 planned steps
    #[schemars(length(min = 3, max = 4))]
    pub planned_steps: Vec<String>,
    /// Information search strategies
    #[schemars(length(min = 2, max = 3))]
    pub search_strategies: Vec<String>,
}

impl ToolArgs for GeneratePlanTool {
    const KIND: ToolKind = ToolKind::GeneratePlanTool;

    fn validate(&self) -> Result<()> {
        check_filled(Self::KIND, "research_goal", &self.research_goal)?;
        check_items(Self::KIND, "planned_steps", &self.planned_steps, 3, 4)?;
        check_items(Self::KIND, "search_strategies", &self.search_strategies, 2, 3)
    }
}

impl GeneratePlanTool {
    pub(crate) fn execute(&self) -> Result<String> {
        dump_without(self, &["reasoning"])
    }
}

/// Revised plan after new findings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AdaptPlanTool {
    /// Why plan needs adaptation based on new data
    pub reasoning: String,
    /// Original research goal
    pub original_goal: String,
    /// Updated research goal
    pub new_goal: String,
    /// Specific changes made to plan
    #[schemars(length(min = 1, max = 3))]
    pub plan_changes: Vec<String>,
    /// Updated remaining steps
    #[schemars(length(min = 2, max = 4))]
    pub next_steps: Vec<String>,
}

impl ToolArgs for AdaptPlanTool {
    const KIND: ToolKind = ToolKind::AdaptPlanTool;

    fn validate(&self) -> Result<()> {
        check_filled(Self::KIND, "new_goal", &self.new_goal)?;
        check_items(Self::KIND, "plan_changes", &self.plan_changes, 1, 3)?;
        check_items(Self::KIND, "next_steps", &self.next_steps, 2, 4)
    }
}

impl AdaptPlanTool {
    pub(crate) fn execute(&self) -> Result<String> {
        dump_without(self, &["reasoning"])
    }
}
