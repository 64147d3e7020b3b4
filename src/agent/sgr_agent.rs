//! Schema-guided reasoning agent.
//!
//! One task runs as a bounded loop over a single [`ConversationContext`]:
//!
//! 1. compute the tools offered at this step (collapsed to the final answer once the
//!    iteration budget is spent),
//! 2. optionally ask the model for a structured self-assessment,
//! 3. ask the model to pick exactly one tool under the variant's tool choice policy,
//! 4. execute the tool and append its result,
//! 5. count the iteration and stop on a finish state or a pending clarification.
//!
//! Model and validation errors propagate out of [`SgrAgent::run`]; nothing is retried here.

use crate::agent::context::{AgentState, ConversationContext};
use crate::agent::prompts::PromptLibrary;
use crate::agent::registry::{AgentLimits, Toolkit};
use crate::agent::tools::{AgentTool, FinalAnswerTool, ReasoningTool, ToolArgs, ToolKind, ToolServices};
use crate::error::{CampusAgentError, Result};
use crate::llm::gateway::CompletionConfig;
use crate::llm::models::{LlmMessage, LlmToolCall};
use crate::llm::tools::ToolChoice;
use crate::llm::LlmBroker;
use crate::streaming::{NullSink, StreamSink};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How the reasoning phase asks the model for its self-assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningMode {
    /// No separate reasoning call
    Skip,
    /// Tool call forced to the reasoning tool
    ForcedTool,
    /// JSON response constrained to the reasoning schema
    StructuredOutput,
}

/// Reasoning mode and tool choice policy of an agent flavour
#[derive(Debug, Clone, PartialEq)]
pub struct AgentVariant {
    pub name: &'static str,
    pub reasoning: ReasoningMode,
    pub tool_choice: ToolChoice,
}

impl AgentVariant {
    pub fn sgr_tools() -> Self {
        Self {
            name: "sgr_tools_agent",
            reasoning: ReasoningMode::ForcedTool,
            tool_choice: ToolChoice::Required,
        }
    }

    pub fn sgr_auto_tools() -> Self {
        Self {
            name: "sgr_auto_tools_agent",
            reasoning: ReasoningMode::ForcedTool,
            tool_choice: ToolChoice::Auto,
        }
    }

    pub fn sgr_structured_output() -> Self {
        Self {
            name: "sgr_so_tools_agent",
            reasoning: ReasoningMode::StructuredOutput,
            tool_choice: ToolChoice::Required,
        }
    }

    /// Reasoning folded into action selection
    pub fn university() -> Self {
        Self {
            name: "university_assistant_agent",
            reasoning: ReasoningMode::Skip,
            tool_choice: ToolChoice::Required,
        }
    }
}

impl Default for AgentVariant {
    fn default() -> Self {
        Self::university()
    }
}

/// What the caller gets back when a run stops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentOutcome {
    Completed { answer: String },
    Failed { answer: String },
    ClarificationNeeded { questions: String },
}

impl AgentOutcome {
    /// Text to show the user
    pub fn text(&self) -> &str {
        match self {
            AgentOutcome::Completed { answer } | AgentOutcome::Failed { answer } => answer,
            AgentOutcome::ClarificationNeeded { questions } => questions,
        }
    }
}

fn object_map(value: Value) -> HashMap<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => HashMap::new(),
    }
}

#[derive(Clone)]
pub struct SgrAgent {
    broker: LlmBroker,
    toolkit: Arc<Toolkit>,
    prompts: Arc<PromptLibrary>,
    services: ToolServices,
    limits: AgentLimits,
    variant: AgentVariant,
    config: CompletionConfig,
    sink: Arc<dyn StreamSink>,
}

impl SgrAgent {
    pub fn builder(broker: LlmBroker) -> SgrAgentBuilder {
        SgrAgentBuilder::new(broker)
    }

    pub fn limits(&self) -> &AgentLimits {
        &self.limits
    }

    pub fn variant(&self) -> &AgentVariant {
        &self.variant
    }

    pub fn toolkit(&self) -> &Toolkit {
        &self.toolkit
    }

    /// Same agent streaming to another sink
    pub fn with_sink(&self, sink: Arc<dyn StreamSink>) -> Self {
        Self {
            sink,
            ..self.clone()
        }
    }

    /// Fresh context for `task`, opened with the rendered request template
    pub fn new_context(&self, task: &str) -> Result<ConversationContext> {
        self.new_context_with_history(task, &[])
    }

    /// Fresh context for `task` that carries earlier question/answer turns ahead of the opening
    pub fn new_context_with_history(&self, task: &str, prior: &[LlmMessage]) -> Result<ConversationContext> {
        let opening = self.prompts.initial_user_request(task)?;
        Ok(ConversationContext::with_history(task, prior.to_vec(), opening))
    }

    /// Append the user's clarification answer to a context waiting for one
    pub fn resume(&self, ctx: &mut ConversationContext, answer: &str) -> Result<()> {
        let turn = self.prompts.clarification_response(answer)?;
        ctx.provide_clarification(turn)
    }

    fn prepare_messages(&self, ctx: &ConversationContext, offered: &[ToolKind]) -> Result<Vec<LlmMessage>> {
        let descriptors = self.toolkit.descriptors_for(offered);
        let system = self.prompts.system_prompt(ctx.sources(), &descriptors)?;

        let mut messages = Vec::with_capacity(ctx.conversation().len() + 1);
        messages.push(LlmMessage::system(system));
        messages.extend(ctx.conversation().iter().cloned());
        Ok(messages)
    }

    /// Ask the model to assess progress, recording the assessment as a tool-call pair
    pub async fn reasoning_phase(
        &self,
        ctx: &mut ConversationContext,
        offered: &[ToolKind],
    ) -> Result<Option<ReasoningTool>> {
        let reasoning = match self.variant.reasoning {
            ReasoningMode::Skip => return Ok(None),
            ReasoningMode::ForcedTool => {
                let descriptor = self
                    .toolkit
                    .descriptor(ToolKind::ReasoningTool)
                    .cloned()
                    .ok_or_else(|| CampusAgentError::ConfigError("Reasoning tool not configured".to_string()))?;
                let messages = self.prepare_messages(ctx, offered)?;
                let choice = ToolChoice::Function(ToolKind::ReasoningTool.name().to_string());

                let response = self
                    .broker
                    .generate_with_tools(&messages, &[descriptor], &choice, &self.config, self.sink.as_ref())
                    .await?;

                let call = response
                    .tool_calls
                    .into_iter()
                    .find(|c| c.name == ToolKind::ReasoningTool.name())
                    .ok_or_else(|| {
                        CampusAgentError::ProtocolViolation("Model did not call the reasoning tool".to_string())
                    })?;
                ReasoningTool::parse(call.arguments_value())?
            }
            ReasoningMode::StructuredOutput => {
                let messages = self.prepare_messages(ctx, offered)?;
                let reasoning: ReasoningTool = self.broker.generate_object(&messages, &self.config).await?;
                reasoning.validate()?;
                reasoning
            }
        };

        let id = format!("{}-reasoning", ctx.iteration);
        ctx.push_tool_call(LlmToolCall {
            id: Some(id.clone()),
            name: ToolKind::ReasoningTool.name().to_string(),
            arguments: object_map(serde_json::to_value(&reasoning)?),
        });
        ctx.push_tool_result(id, reasoning.execute()?);

        info!(
            task_id = %ctx.task_id,
            iteration = ctx.iteration,
            enough_data = reasoning.enough_data,
            task_completed = reasoning.task_completed,
            remaining_steps = ?reasoning.remaining_steps,
            "Reasoning"
        );

        Ok(Some(reasoning))
    }

    /// Ask the model for exactly one of the offered tools and announce it in the log
    pub async fn select_action_phase(
        &self,
        ctx: &mut ConversationContext,
        offered: &[ToolKind],
    ) -> Result<AgentTool> {
        let choice = if offered == [ToolKind::FinalAnswerTool] {
            ToolChoice::Function(ToolKind::FinalAnswerTool.name().to_string())
        } else {
            self.variant.tool_choice.clone()
        };

        let messages = self.prepare_messages(ctx, offered)?;
        let descriptors = self.toolkit.descriptors_for(offered);
        let response = self
            .broker
            .generate_with_tools(&messages, &descriptors, &choice, &self.config, self.sink.as_ref())
            .await?;

        if response.tool_calls.len() > 1 {
            warn!(count = response.tool_calls.len(), "Model returned several tool calls; using the first");
        }

        let tool = match response.tool_calls.into_iter().next() {
            Some(call) => {
                let kind = ToolKind::from_name(&call.name).ok_or_else(|| {
                    CampusAgentError::ProtocolViolation(format!("Unknown tool: {}", call.name))
                })?;
                if !offered.contains(&kind) {
                    return Err(CampusAgentError::ProtocolViolation(format!(
                        "Tool {} was not offered at this step",
                        kind
                    )));
                }
                AgentTool::from_call(&call.name, call.arguments_value())?
            }
            None if choice.requires_call() => {
                return Err(CampusAgentError::ProtocolViolation(format!(
                    "No tool call in response under tool choice {:?}",
                    choice
                )));
            }
            None => match response.content.filter(|c| !c.trim().is_empty()) {
                Some(text) => {
                    debug!("Model answered without a tool call; treating as final answer");
                    AgentTool::FinalAnswer(FinalAnswerTool::direct(text))
                }
                None => {
                    return Err(CampusAgentError::ProtocolViolation(
                        "Empty response without a tool call".to_string(),
                    ));
                }
            },
        };

        let id = format!("{}-action", ctx.iteration);
        let arguments = tool.arguments()?;
        let arguments_json = serde_json::to_string(&arguments)?;
        ctx.push_tool_call(LlmToolCall {
            id: Some(id.clone()),
            name: tool.name().to_string(),
            arguments: object_map(arguments),
        });
        self.sink.tool_call(&id, tool.name(), &arguments_json);

        info!(task_id = %ctx.task_id, iteration = ctx.iteration, tool = tool.name(), "Selected tool");
        Ok(tool)
    }

    /// Execute one tool against the context and append its result
    pub async fn action_phase(&self, ctx: &mut ConversationContext, tool: &AgentTool) -> Result<String> {
        if ctx.is_finished() {
            return Err(CampusAgentError::AgentError(format!(
                "Refusing to run {} on a finished task ({:?})",
                tool.name(),
                ctx.state()
            )));
        }

        let result = tool.execute(ctx, &self.services).await?;

        let id = format!("{}-action", ctx.iteration);
        ctx.push_tool_result(&id, &result);
        self.sink.tool_result(&id, &result);

        info!(
            task_id = %ctx.task_id,
            iteration = ctx.iteration,
            tool = tool.name(),
            state = ?ctx.state(),
            result_chars = result.chars().count(),
            "Executed tool"
        );
        debug!(result = result.as_str(), "Tool result");

        Ok(result)
    }

    /// Drive the context until it finishes or waits for the user.
    ///
    /// On error the context is marked [`AgentState::Error`] and the error is returned.
    pub async fn run(&self, ctx: &mut ConversationContext) -> Result<AgentOutcome> {
        if ctx.is_finished() {
            return Err(CampusAgentError::AgentError(format!(
                "Task {} already finished ({:?})",
                ctx.task_id,
                ctx.state()
            )));
        }
        if ctx.state() == AgentState::WaitingForClarification {
            return Err(CampusAgentError::AgentError(
                "Task is waiting for a clarification answer".to_string(),
            ));
        }
        ctx.transition(AgentState::Researching)?;

        info!(
            task_id = %ctx.task_id,
            agent = self.variant.name,
            max_iterations = self.limits.max_iterations,
            max_clarifications = self.limits.max_clarifications,
            "Starting task"
        );

        let outcome = self.run_cycles(ctx).await;
        if let Err(e) = &outcome {
            error!(task_id = %ctx.task_id, iteration = ctx.iteration, error = %e, "Task aborted");
            if let Err(transition) = ctx.transition(AgentState::Error) {
                warn!(error = %transition, "Could not mark task as errored");
            }
        }
        self.sink.finish();
        outcome
    }

    async fn run_cycles(&self, ctx: &mut ConversationContext) -> Result<AgentOutcome> {
        loop {
            let offered = self.toolkit.offered(ctx, &self.limits);
            if ctx.iteration >= self.limits.max_iterations {
                warn!(
                    task_id = %ctx.task_id,
                    iteration = ctx.iteration,
                    "Iteration budget spent; forcing final answer"
                );
            }

            self.reasoning_phase(ctx, &offered).await?;
            let tool = self.select_action_phase(ctx, &offered).await?;
            let result = self.action_phase(ctx, &tool).await?;
            ctx.iteration += 1;

            match ctx.state() {
                AgentState::Completed | AgentState::Failed => {
                    let answer = ctx.execution_result().unwrap_or_default().to_string();
                    info!(task_id = %ctx.task_id, iterations = ctx.iteration, state = ?ctx.state(), "Task finished");
                    return Ok(if ctx.state() == AgentState::Completed {
                        AgentOutcome::Completed { answer }
                    } else {
                        AgentOutcome::Failed { answer }
                    });
                }
                AgentState::WaitingForClarification => {
                    info!(
                        task_id = %ctx.task_id,
                        clarifications_used = ctx.clarifications_used,
                        "Waiting for clarification"
                    );
                    return Ok(AgentOutcome::ClarificationNeeded { questions: result });
                }
                _ => {}
            }
        }
    }
}

/// Builder for constructing an [`SgrAgent`] with custom configuration.
pub struct SgrAgentBuilder {
    broker: LlmBroker,
    toolkit: Option<Toolkit>,
    prompts: Option<PromptLibrary>,
    services: ToolServices,
    limits: AgentLimits,
    variant: AgentVariant,
    config: CompletionConfig,
    sink: Arc<dyn StreamSink>,
}

impl SgrAgentBuilder {
    fn new(broker: LlmBroker) -> Self {
        Self {
            broker,
            toolkit: None,
            prompts: None,
            services: ToolServices::default(),
            limits: AgentLimits::default(),
            variant: AgentVariant::default(),
            config: CompletionConfig::default(),
            sink: Arc::new(NullSink),
        }
    }

    pub fn toolkit(mut self, toolkit: Toolkit) -> Self {
        self.toolkit = Some(toolkit);
        self
    }

    pub fn prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn services(mut self, services: ToolServices) -> Self {
        self.services = services;
        self
    }

    pub fn limits(mut self, limits: AgentLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.limits.max_iterations = max_iterations;
        self
    }

    pub fn max_clarifications(mut self, max_clarifications: usize) -> Self {
        self.limits.max_clarifications = max_clarifications;
        self
    }

    pub fn variant(mut self, variant: AgentVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn config(mut self, config: CompletionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn StreamSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Build the agent; the university toolkit and embedded prompts are the defaults
    pub fn build(self) -> Result<SgrAgent> {
        let toolkit = match self.toolkit {
            Some(toolkit) => toolkit,
            None => Toolkit::university()?,
        };
        let prompts = match self.prompts {
            Some(prompts) => prompts,
            None => PromptLibrary::embedded()?,
        };

        Ok(SgrAgent {
            broker: self.broker,
            toolkit: Arc::new(toolkit),
            prompts: Arc::new(prompts),
            services: self.services,
            limits: self.limits,
            variant: self.variant,
            config: self.config,
            sink: self.sink,
        })
    }
}
