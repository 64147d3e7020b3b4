//! The closed set of structured tools the agent can ask the model to call.
//!
//! Every tool is a plain struct deriving `Deserialize`, `Serialize` and `JsonSchema`. The
//! model sees each tool as a function whose parameters are the struct's JSON schema; its
//! call comes back as a name plus JSON arguments, which [`AgentTool::from_call`] turns
//! into a validated value. Dispatch is on [`ToolKind`], never on open-ended registration.

mod clarification;
mod final_answer;
mod general_info;
mod map;
mod planning;
mod reasoning;
mod schedule;

pub use clarification::ClarificationTool;
pub use final_answer::{FinalAnswerStatus, FinalAnswerTool};
pub use general_info::GeneralInfoTool;
pub use map::{MapQueryType, MapTool};
pub use planning::{AdaptPlanTool, GeneratePlanTool};
pub use reasoning::ReasoningTool;
pub use schedule::{ScheduleQueryType, ScheduleTool};

use crate::agent::context::ConversationContext;
use crate::error::{CampusAgentError, Result};
use crate::knowledge::{KnowledgeBase, SearchHit};
use crate::llm::tools::{parameters_schema, ToolDescriptor};
use crate::schedule::ScheduleSource;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

const SNIPPET_CHARS: usize = 200;

/// Discriminant of [`AgentTool`]; its name is what the model sees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    ReasoningTool,
    ClarificationTool,
    GeneratePlanTool,
    AdaptPlanTool,
    FinalAnswerTool,
    ScheduleTool,
    MapTool,
    GeneralInfoTool,
}

impl ToolKind {
    pub const ALL: [ToolKind; 8] = [
        ToolKind::ReasoningTool,
        ToolKind::ClarificationTool,
        ToolKind::GeneratePlanTool,
        ToolKind::AdaptPlanTool,
        ToolKind::FinalAnswerTool,
        ToolKind::ScheduleTool,
        ToolKind::MapTool,
        ToolKind::GeneralInfoTool,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ReasoningTool => "reasoningtool",
            ToolKind::ClarificationTool => "clarificationtool",
            ToolKind::GeneratePlanTool => "generateplantool",
            ToolKind::AdaptPlanTool => "adaptplantool",
            ToolKind::FinalAnswerTool => "finalanswertool",
            ToolKind::ScheduleTool => "scheduletool",
            ToolKind::MapTool => "maptool",
            ToolKind::GeneralInfoTool => "generalinfotool",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::ReasoningTool => {
                "Assess research progress: reason step by step, summarize the situation and decide what remains."
            }
            ToolKind::ClarificationTool => {
                "Ask the user clarifying questions when the request is ambiguous or lacks required details."
            }
            ToolKind::GeneratePlanTool => {
                "Create a research plan with concrete steps and search strategies for the request."
            }
            ToolKind::AdaptPlanTool => {
                "Adapt the current research plan after new findings change the goal or the next steps."
            }
            ToolKind::FinalAnswerTool => {
                "Finish the task with a complete, verified answer, or declare that it could not be completed."
            }
            ToolKind::ScheduleTool => {
                "Retrieve class schedules for a group, teacher, department or room, including time, place and teacher."
            }
            ToolKind::MapTool => {
                "Answer navigation and location questions about the university campus: rooms, routes, buildings and facilities."
            }
            ToolKind::GeneralInfoTool => {
                "Look up general university information (admission, contacts, departments, events, rules, services) in the knowledge base."
            }
        }
    }

    /// Terminal tools end the current run of the loop
    pub fn is_terminal(self) -> bool {
        matches!(self, ToolKind::FinalAnswerTool | ToolKind::ClarificationTool)
    }

    /// Model-facing function descriptor generated from the tool's schema
    pub fn descriptor(self) -> Result<ToolDescriptor> {
        let parameters = match self {
            ToolKind::ReasoningTool => parameters_schema::<ReasoningTool>()?,
            ToolKind::ClarificationTool => parameters_schema::<ClarificationTool>()?,
            ToolKind::GeneratePlanTool => parameters_schema::<GeneratePlanTool>()?,
            ToolKind::AdaptPlanTool => parameters_schema::<AdaptPlanTool>()?,
            ToolKind::FinalAnswerTool => parameters_schema::<FinalAnswerTool>()?,
            ToolKind::ScheduleTool => parameters_schema::<ScheduleTool>()?,
            ToolKind::MapTool => parameters_schema::<MapTool>()?,
            ToolKind::GeneralInfoTool => parameters_schema::<GeneralInfoTool>()?,
        };
        Ok(ToolDescriptor::function(self.name(), self.description(), parameters))
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Arguments of one tool kind, checked against their declared bounds
pub(crate) trait ToolArgs: DeserializeOwned + Serialize + JsonSchema {
    const KIND: ToolKind;

    fn validate(&self) -> Result<()>;

    fn parse(arguments: Value) -> Result<Self> {
        let args: Self = serde_json::from_value(arguments).map_err(|e| {
            CampusAgentError::ValidationError(format!("{}: {}", Self::KIND, e))
        })?;
        args.validate()?;
        Ok(args)
    }
}

pub(crate) fn check_items<T>(kind: ToolKind, field: &str, items: &[T], min: usize, max: usize) -> Result<()> {
    if items.len() < min || items.len() > max {
        return Err(CampusAgentError::ValidationError(format!(
            "{}.{}: expected {}..={} items, got {}",
            kind,
            field,
            min,
            max,
            items.len()
        )));
    }
    Ok(())
}

pub(crate) fn check_chars(kind: ToolKind, field: &str, value: &str, max: usize) -> Result<()> {
    let count = value.chars().count();
    if count > max {
        return Err(CampusAgentError::ValidationError(format!(
            "{}.{}: at most {} characters allowed, got {}",
            kind, field, max, count
        )));
    }
    Ok(())
}

pub(crate) fn check_filled(kind: ToolKind, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CampusAgentError::ValidationError(format!(
            "{}.{}: must not be empty",
            kind, field
        )));
    }
    Ok(())
}

/// Pretty JSON of `args` without the fields named in `exclude`
pub(crate) fn dump_without<T: Serialize>(args: &T, exclude: &[&str]) -> Result<String> {
    let mut value = serde_json::to_value(args)?;
    if let Some(obj) = value.as_object_mut() {
        for key in exclude {
            obj.remove(*key);
        }
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Collaborators the tools reach through narrow traits
#[derive(Clone)]
pub struct ToolServices {
    pub knowledge: Option<Arc<dyn KnowledgeBase>>,
    pub schedule: Option<Arc<dyn ScheduleSource>>,
    /// Number of knowledge-base hits requested per search
    pub top_k: usize,
}

impl Default for ToolServices {
    fn default() -> Self {
        Self {
            knowledge: None,
            schedule: None,
            top_k: 5,
        }
    }
}

impl ToolServices {
    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn with_schedule(mut self, schedule: Arc<dyn ScheduleSource>) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// Search the knowledge base and record every hit as a numbered source
pub(crate) async fn search_and_cite(
    ctx: &mut ConversationContext,
    knowledge: &dyn KnowledgeBase,
    query: &str,
    top_k: usize,
) -> Result<Vec<(usize, SearchHit)>> {
    let hits = knowledge.search(query, top_k).await?;
    Ok(hits
        .into_iter()
        .map(|hit| {
            let snippet: String = hit.text.chars().take(SNIPPET_CHARS).collect();
            let number = ctx.add_source(snippet, hit.text.clone());
            (number, hit)
        })
        .collect())
}

pub(crate) fn format_cited(cited: &[(usize, SearchHit)]) -> String {
    cited
        .iter()
        .map(|(number, hit)| format!("[{}] (relevance {:.2}) {}", number, hit.score, hit.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// A validated tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum AgentTool {
    Reasoning(ReasoningTool),
    Clarification(ClarificationTool),
    GeneratePlan(GeneratePlanTool),
    AdaptPlan(AdaptPlanTool),
    FinalAnswer(FinalAnswerTool),
    Schedule(ScheduleTool),
    Map(MapTool),
    GeneralInfo(GeneralInfoTool),
}

impl AgentTool {
    /// Build a tool from a model call, validating arguments against the declared bounds
    pub fn from_call(name: &str, arguments: Value) -> Result<Self> {
        let kind = ToolKind::from_name(name).ok_or_else(|| {
            CampusAgentError::ProtocolViolation(format!("Unknown tool: {}", name))
        })?;

        Ok(match kind {
            ToolKind::ReasoningTool => AgentTool::Reasoning(ReasoningTool::parse(arguments)?),
            ToolKind::ClarificationTool => AgentTool::Clarification(ClarificationTool::parse(arguments)?),
            ToolKind::GeneratePlanTool => AgentTool::GeneratePlan(GeneratePlanTool::parse(arguments)?),
            ToolKind::AdaptPlanTool => AgentTool::AdaptPlan(AdaptPlanTool::parse(arguments)?),
            ToolKind::FinalAnswerTool => AgentTool::FinalAnswer(FinalAnswerTool::parse(arguments)?),
            ToolKind::ScheduleTool => AgentTool::Schedule(ScheduleTool::parse(arguments)?),
            ToolKind::MapTool => AgentTool::Map(MapTool::parse(arguments)?),
            ToolKind::GeneralInfoTool => AgentTool::GeneralInfo(GeneralInfoTool::parse(arguments)?),
        })
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            AgentTool::Reasoning(_) => ToolKind::ReasoningTool,
            AgentTool::Clarification(_) => ToolKind::ClarificationTool,
            AgentTool::GeneratePlan(_) => ToolKind::GeneratePlanTool,
            AgentTool::AdaptPlan(_) => ToolKind::AdaptPlanTool,
            AgentTool::FinalAnswer(_) => ToolKind::FinalAnswerTool,
            AgentTool::Schedule(_) => ToolKind::ScheduleTool,
            AgentTool::Map(_) => ToolKind::MapTool,
            AgentTool::GeneralInfo(_) => ToolKind::GeneralInfoTool,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Arguments as JSON, as announced back to the model
    pub fn arguments(&self) -> Result<Value> {
        Ok(match self {
            AgentTool::Reasoning(t) => serde_json::to_value(t)?,
            AgentTool::Clarification(t) => serde_json::to_value(t)?,
            AgentTool::GeneratePlan(t) => serde_json::to_value(t)?,
            AgentTool::AdaptPlan(t) => serde_json::to_value(t)?,
            AgentTool::FinalAnswer(t) => serde_json::to_value(t)?,
            AgentTool::Schedule(t) => serde_json::to_value(t)?,
            AgentTool::Map(t) => serde_json::to_value(t)?,
            AgentTool::GeneralInfo(t) => serde_json::to_value(t)?,
        })
    }

    /// Run the tool against the context and return its textual result
    pub async fn execute(&self, ctx: &mut ConversationContext, services: &ToolServices) -> Result<String> {
        match self {
            AgentTool::Reasoning(t) => t.execute(),
            AgentTool::Clarification(t) => t.execute(ctx),
            AgentTool::GeneratePlan(t) => t.execute(),
            AgentTool::AdaptPlan(t) => t.execute(),
            AgentTool::FinalAnswer(t) => t.execute(ctx),
            AgentTool::Schedule(t) => t.execute(services).await,
            AgentTool::Map(t) => t.execute(ctx, services).await,
            AgentTool::GeneralInfo(t) => t.execute(ctx, services).await,
        }
    }
}
