//! Which tools the model may call at a given step.

use crate::agent::context::ConversationContext;
use crate::agent::tools::ToolKind;
use crate::error::Result;
use crate::llm::tools::ToolDescriptor;
use std::collections::HashMap;

/// Iteration and clarification budgets for one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentLimits {
    pub max_iterations: usize,
    pub max_clarifications: usize,
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_clarifications: 3,
        }
    }
}

/// The configured tool catalog with descriptors built once at startup
#[derive(Debug, Clone)]
pub struct Toolkit {
    kinds: Vec<ToolKind>,
    descriptors: HashMap<ToolKind, ToolDescriptor>,
}

impl Toolkit {
    /// Build a toolkit from `kinds`, deduplicated in order. The final-answer tool is
    /// always present so the loop can be forced to finish.
    pub fn new(kinds: impl IntoIterator<Item = ToolKind>) -> Result<Self> {
        let mut ordered = Vec::new();
        for kind in kinds.into_iter().chain([ToolKind::FinalAnswerTool]) {
            if !ordered.contains(&kind) {
                ordered.push(kind);
            }
        }

        let mut descriptors = HashMap::new();
        for kind in ToolKind::ALL {
            if ordered.contains(&kind) || kind == ToolKind::ReasoningTool {
                descriptors.insert(kind, kind.descriptor()?);
            }
        }

        Ok(Self {
            kinds: ordered,
            descriptors,
        })
    }

    /// Planning, clarification and final answer plus the campus tools
    pub fn university() -> Result<Self> {
        Self::new([
            ToolKind::ClarificationTool,
            ToolKind::GeneratePlanTool,
            ToolKind::AdaptPlanTool,
            ToolKind::FinalAnswerTool,
            ToolKind::ScheduleTool,
            ToolKind::MapTool,
            ToolKind::GeneralInfoTool,
        ])
    }

    pub fn kinds(&self) -> &[ToolKind] {
        &self.kinds
    }

    pub fn contains(&self, kind: ToolKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Descriptor of any configured kind, and of the reasoning tool
    pub fn descriptor(&self, kind: ToolKind) -> Option<&ToolDescriptor> {
        self.descriptors.get(&kind)
    }

    /// Tools offered for action selection at the context's current step.
    ///
    /// Reasoning is never offered as an action. Once the iteration budget is spent only
    /// the final answer remains; once the clarification budget is spent clarification
    /// is withdrawn.
    pub fn offered(&self, ctx: &ConversationContext, limits: &AgentLimits) -> Vec<ToolKind> {
        if ctx.iteration >= limits.max_iterations {
            return vec![ToolKind::FinalAnswerTool];
        }

        self.kinds
            .iter()
            .copied()
            .filter(|kind| *kind != ToolKind::ReasoningTool)
            .filter(|kind| {
                *kind != ToolKind::ClarificationTool || ctx.clarifications_used < limits.max_clarifications
            })
            .collect()
    }

    pub fn descriptors_for(&self, kinds: &[ToolKind]) -> Vec<ToolDescriptor> {
        kinds.iter().filter_map(|kind| self.descriptor(*kind).cloned()).collect()
    }
}
