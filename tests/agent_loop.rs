//! End-to-end behaviour of the agent loop against a policy-driven fake model.

use async_trait::async_trait;
use campus_agent::agent::tools::ToolKind;
use campus_agent::agent::{
    AgentLimits, AgentOutcome, AgentService, AgentState, ConversationContext, SgrAgent, ToolServices, Toolkit,
};
use campus_agent::error::{CampusAgentError, Result};
use campus_agent::knowledge::{KnowledgeBase, SearchHit};
use campus_agent::llm::{
    CompletionConfig, LlmBroker, LlmGateway, LlmGatewayResponse, LlmMessage, LlmToolCall, MessageRole,
    StreamChunk, ToolChoice, ToolDescriptor,
};
use campus_agent::streaming::{AgentStreamEvent, ChannelSink};
use futures::stream::{self, Stream};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// What the fake model saw on one request
#[derive(Debug, Clone)]
struct Request {
    tools: Vec<String>,
    choice: Option<ToolChoice>,
    messages: Vec<LlmMessage>,
}

impl Request {
    fn offers(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t == name)
    }
}

type Policy = Box<dyn Fn(usize, &Request) -> Result<LlmGatewayResponse> + Send + Sync>;

/// Fake model answering each request through a policy over (request index, request)
struct PolicyGateway {
    policy: Policy,
    requests: Mutex<Vec<Request>>,
}

impl PolicyGateway {
    fn new(policy: impl Fn(usize, &Request) -> Result<LlmGatewayResponse> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            policy: Box::new(policy),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(
        &self,
        messages: &[LlmMessage],
        tools: Option<&[ToolDescriptor]>,
        tool_choice: Option<&ToolChoice>,
    ) -> Result<LlmGatewayResponse> {
        let request = Request {
            tools: tools.unwrap_or_default().iter().map(|t| t.name().to_string()).collect(),
            choice: tool_choice.cloned(),
            messages: messages.to_vec(),
        };
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        (self.policy)(index, &request)
    }
}

#[async_trait]
impl LlmGateway for PolicyGateway {
    async fn complete(
        &self,
        _model: &str,
        messages: &[LlmMessage],
        tools: Option<&[ToolDescriptor]>,
        tool_choice: Option<&ToolChoice>,
        _config: &CompletionConfig,
    ) -> Result<LlmGatewayResponse> {
        self.respond(messages, tools, tool_choice)
    }

    async fn complete_json(
        &self,
        _model: &str,
        _messages: &[LlmMessage],
        _schema: Value,
        _config: &CompletionConfig,
    ) -> Result<Value> {
        Err(CampusAgentError::GatewayError("structured output not scripted".to_string()))
    }

    async fn calculate_embeddings(&self, _text: &str, _model: Option<&str>) -> Result<Vec<f32>> {
        Ok(vec![1.0])
    }

    fn complete_stream<'a>(
        &'a self,
        _model: &'a str,
        messages: &'a [LlmMessage],
        tools: Option<&'a [ToolDescriptor]>,
        tool_choice: Option<&'a ToolChoice>,
        _config: &'a CompletionConfig,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
        let chunks: Vec<Result<StreamChunk>> = match self.respond(messages, tools, tool_choice) {
            Ok(response) => {
                let mut chunks = Vec::new();
                if let Some(content) = response.content {
                    chunks.push(Ok(StreamChunk::Content(content)));
                }
                if !response.tool_calls.is_empty() {
                    chunks.push(Ok(StreamChunk::ToolCalls(response.tool_calls)));
                }
                chunks
            }
            Err(e) => vec![Err(e)],
        };
        Box::pin(stream::iter(chunks))
    }
}

struct LibraryKnowledge;

#[async_trait]
impl KnowledgeBase for LibraryKnowledge {
    async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let hits = vec![
            SearchHit {
                text: "The library is open 9:00-21:00 on weekdays.".to_string(),
                score: 0.92,
                metadata: HashMap::new(),
            },
            SearchHit {
                text: "The reading room is on the second floor of building 52.".to_string(),
                score: 0.71,
                metadata: HashMap::new(),
            },
        ];
        Ok(hits.into_iter().take(top_k).collect())
    }
}

fn call(name: &str, args: Value) -> Result<LlmGatewayResponse> {
    let arguments = match args {
        Value::Object(map) => map.into_iter().collect(),
        _ => HashMap::new(),
    };
    Ok(LlmGatewayResponse {
        content: None,
        tool_calls: vec![LlmToolCall {
            id: Some("call_1".to_string()),
            name: name.to_string(),
            arguments,
        }],
    })
}

fn final_answer(answer: &str) -> Result<LlmGatewayResponse> {
    call(
        "finalanswertool",
        json!({
            "reasoning": "All needed data collected",
            "completed_steps": ["Collected data", "Verified answer"],
            "answer": answer,
            "status": "completed"
        }),
    )
}

fn plan() -> Result<LlmGatewayResponse> {
    call(
        "generateplantool",
        json!({
            "reasoning": "Need a plan",
            "research_goal": "Answer the question",
            "planned_steps": ["Read", "Compute", "Answer"],
            "search_strategies": ["Arithmetic", "Double check"]
        }),
    )
}

fn clarification() -> Result<LlmGatewayResponse> {
    call(
        "clarificationtool",
        json!({
            "reasoning": "The group is not specified",
            "unclear_terms": ["my group"],
            "assumptions": ["Bachelor group", "Current week"],
            "questions": ["Which group?", "Which week?", "Which day?"]
        }),
    )
}

fn build_agent(gateway: Arc<PolicyGateway>, toolkit: Toolkit, limits: AgentLimits) -> SgrAgent {
    SgrAgent::builder(LlmBroker::new("fake-model", gateway))
        .toolkit(toolkit)
        .limits(limits)
        .config(CompletionConfig {
            stream: false,
            ..CompletionConfig::default()
        })
        .build()
        .unwrap()
}

fn limits(max_iterations: usize, max_clarifications: usize) -> AgentLimits {
    AgentLimits {
        max_iterations,
        max_clarifications,
    }
}

fn plan_toolkit() -> Toolkit {
    Toolkit::new([ToolKind::GeneratePlanTool, ToolKind::ClarificationTool]).unwrap()
}

/// Calls the plan tool for as long as anything else is offered
fn stubborn_planner() -> Arc<PolicyGateway> {
    PolicyGateway::new(|_, request| {
        if request.offers("generateplantool") {
            plan()
        } else {
            final_answer("Gave up planning")
        }
    })
}

#[tokio::test]
async fn terminates_within_budget_plus_one() {
    for max_iterations in 0..4 {
        let gateway = stubborn_planner();
        let agent = build_agent(gateway.clone(), plan_toolkit(), limits(max_iterations, 3));
        let mut ctx = agent.new_context("never-ending task").unwrap();

        let outcome = agent.run(&mut ctx).await.unwrap();

        assert_eq!(outcome.text(), "Gave up planning");
        assert!(ctx.iteration <= max_iterations + 1);
        assert_eq!(ctx.iteration, max_iterations + 1);

        let requests = gateway.requests();
        let last = requests.last().unwrap();
        assert_eq!(last.tools, vec!["finalanswertool".to_string()]);
        assert_eq!(last.choice, Some(ToolChoice::Function("finalanswertool".to_string())));
        for earlier in &requests[..requests.len() - 1] {
            assert_eq!(earlier.choice, Some(ToolChoice::Required));
        }
    }
}

#[tokio::test]
async fn conversation_is_append_only() {
    let gateway = stubborn_planner();
    let agent = build_agent(gateway.clone(), plan_toolkit(), limits(3, 3));
    let mut ctx = agent.new_context("task").unwrap();

    agent.run(&mut ctx).await.unwrap();

    let requests = gateway.requests();
    for pair in requests.windows(2) {
        let before = &pair[0].messages[1..];
        let after = &pair[1].messages[1..];
        assert!(after.len() > before.len());
        assert_eq!(&after[..before.len()], before);
    }
    assert_eq!(requests[0].messages[0].role, MessageRole::System);

    let last = &requests.last().unwrap().messages[1..];
    assert_eq!(&ctx.conversation()[..last.len()], last);
}

#[tokio::test]
async fn two_plus_two_scenario() {
    let gateway = PolicyGateway::new(|index, _| if index == 0 { plan() } else { final_answer("4") });
    let agent = build_agent(gateway, plan_toolkit(), limits(5, 1));
    let mut ctx = agent.new_context("what is 2+2").unwrap();

    let outcome = agent.run(&mut ctx).await.unwrap();

    assert_eq!(outcome, AgentOutcome::Completed { answer: "4".to_string() });
    assert_eq!(ctx.state(), AgentState::Completed);
    assert_eq!(ctx.execution_result(), Some("4"));
    assert_eq!(ctx.iteration, 2);

    let log = ctx.conversation();
    assert_eq!(log.len(), 5);
    assert_eq!(log[0].role, MessageRole::User);
    assert!(log[0].content.as_deref().unwrap().contains("2+2"));
    let announced: Vec<(&str, &str)> = log
        .iter()
        .filter_map(|m| m.tool_calls.as_ref())
        .map(|calls| (calls[0].id.as_deref().unwrap(), calls[0].name.as_str()))
        .collect();
    assert_eq!(announced, vec![("0-action", "generateplantool"), ("1-action", "finalanswertool")]);
    assert_eq!(log[2].tool_call_id.as_deref(), Some("0-action"));
    assert!(!log[2].content.as_deref().unwrap().contains("Need a plan"));
    assert_eq!(log[4].tool_call_id.as_deref(), Some("1-action"));
}

#[tokio::test]
async fn clarification_budget_is_enforced() {
    let gateway = PolicyGateway::new(|_, request| {
        if request.offers("clarificationtool") {
            clarification()
        } else {
            final_answer("Assumed group 4236")
        }
    });
    let agent = build_agent(gateway.clone(), plan_toolkit(), limits(10, 2));
    let mut ctx = agent.new_context("my schedule").unwrap();

    let first = agent.run(&mut ctx).await.unwrap();
    assert_eq!(
        first,
        AgentOutcome::ClarificationNeeded {
            questions: "Which group?\nWhich week?\nWhich day?".to_string()
        }
    );
    assert_eq!(ctx.state(), AgentState::WaitingForClarification);

    agent.resume(&mut ctx, "I am not sure").unwrap();
    assert!(matches!(agent.run(&mut ctx).await.unwrap(), AgentOutcome::ClarificationNeeded { .. }));
    assert_eq!(ctx.clarifications_used, 2);

    agent.resume(&mut ctx, "Just guess").unwrap();
    let outcome = agent.run(&mut ctx).await.unwrap();

    assert_eq!(outcome.text(), "Assumed group 4236");
    assert_eq!(ctx.clarifications_used, 2);
    assert!(!gateway.requests().last().unwrap().offers("clarificationtool"));
}

#[tokio::test]
async fn single_clarification_budget_withdraws_tool_after_resume() {
    let gateway = PolicyGateway::new(|_, request| {
        if request.offers("clarificationtool") {
            clarification()
        } else {
            final_answer("Assumed the current week")
        }
    });
    let agent = build_agent(gateway.clone(), plan_toolkit(), limits(10, 1));
    let mut ctx = agent.new_context("my schedule").unwrap();

    let first = agent.run(&mut ctx).await.unwrap();
    assert!(matches!(first, AgentOutcome::ClarificationNeeded { .. }));
    assert_eq!(ctx.clarifications_used, 1);
    assert!(gateway.requests()[0].offers("clarificationtool"));

    agent.resume(&mut ctx, "group 4236").unwrap();
    let second = agent.run(&mut ctx).await.unwrap();

    let requests = gateway.requests();
    assert_eq!(requests.len(), 2);
    assert!(!requests[1].offers("clarificationtool"));
    assert_eq!(second.text(), "Assumed the current week");
    assert_eq!(ctx.clarifications_used, 1);
    assert_eq!(ctx.state(), AgentState::Completed);
}

#[tokio::test]
async fn clarification_resume_continues_same_context() {
    let gateway = PolicyGateway::new(|index, _| {
        if index == 0 {
            clarification()
        } else {
            final_answer("Group 4236 has Mathematics on Monday at 09:30")
        }
    });
    let agent = build_agent(gateway.clone(), plan_toolkit(), limits(10, 3));
    let mut ctx = agent.new_context("when is my math class").unwrap();

    agent.run(&mut ctx).await.unwrap();
    let task_id = ctx.task_id;
    let logged = ctx.conversation().len();

    // Waiting contexts are not run again until answered
    assert!(agent.run(&mut ctx).await.is_err());
    assert_eq!(gateway.requests().len(), 1);

    agent.resume(&mut ctx, "4236").unwrap();
    let outcome = agent.run(&mut ctx).await.unwrap();

    assert!(matches!(outcome, AgentOutcome::Completed { .. }));
    assert_eq!(ctx.task_id, task_id);
    assert_eq!(ctx.conversation()[logged].role, MessageRole::User);
    assert_eq!(ctx.conversation()[logged].content.as_deref(), Some("CLARIFICATIONS:\n4236"));
    assert_eq!(ctx.iteration, 2);
}

#[tokio::test]
async fn finished_context_is_never_executed_again() {
    let gateway = PolicyGateway::new(|_, _| final_answer("done"));
    let agent = build_agent(gateway.clone(), plan_toolkit(), limits(3, 1));
    let mut ctx = agent.new_context("task").unwrap();
    agent.run(&mut ctx).await.unwrap();
    let snapshot = ctx.clone();

    let err = agent.run(&mut ctx).await.unwrap_err();

    assert!(matches!(err, CampusAgentError::AgentError(_)));
    assert_eq!(ctx, snapshot);
    assert_eq!(gateway.requests().len(), 1);
}

#[tokio::test]
async fn forced_final_answer_rejects_other_tools() {
    let gateway = PolicyGateway::new(|_, _| plan());
    let agent = build_agent(gateway, plan_toolkit(), limits(0, 1));
    let mut ctx = agent.new_context("task").unwrap();

    let err = agent.run(&mut ctx).await.unwrap_err();

    assert!(matches!(err, CampusAgentError::ProtocolViolation(_)));
    assert_eq!(ctx.state(), AgentState::Error);
    assert!(ctx.execution_result().is_none());
}

#[tokio::test]
async fn unknown_tool_and_invalid_arguments_are_rejected() {
    let gateway = PolicyGateway::new(|_, _| call("weathertool", json!({"city": "Saint Petersburg"})));
    let agent = build_agent(gateway, plan_toolkit(), limits(3, 1));
    let mut ctx = agent.new_context("weather?").unwrap();
    assert!(matches!(
        agent.run(&mut ctx).await,
        Err(CampusAgentError::ProtocolViolation(_))
    ));

    let gateway = PolicyGateway::new(|_, _| {
        call(
            "finalanswertool",
            json!({"reasoning": "r", "completed_steps": [], "answer": "4", "status": "completed"}),
        )
    });
    let agent = build_agent(gateway, plan_toolkit(), limits(3, 1));
    let mut ctx = agent.new_context("what is 2+2").unwrap();
    assert!(matches!(
        agent.run(&mut ctx).await,
        Err(CampusAgentError::ValidationError(_))
    ));
    assert_eq!(ctx.state(), AgentState::Error);
}

#[tokio::test]
async fn knowledge_results_become_cited_sources() {
    let gateway = PolicyGateway::new(|index, _| {
        if index == 0 {
            call("generalinfotool", json!({"query": "library hours", "category": "services"}))
        } else {
            final_answer("The library is open 9:00-21:00 on weekdays [1].")
        }
    });
    let agent = SgrAgent::builder(LlmBroker::new("fake-model", gateway.clone()))
        .services(ToolServices::default().with_knowledge(Arc::new(LibraryKnowledge)))
        .build()
        .unwrap();
    let mut ctx = agent.new_context("When is the library open?").unwrap();

    agent.run(&mut ctx).await.unwrap();

    assert_eq!(ctx.sources().len(), 2);
    assert_eq!(ctx.sources()[0].number, 1);
    let result = ctx.conversation()[2].content.as_deref().unwrap();
    assert!(result.starts_with("Knowledge base results (services) for: library hours"));
    assert!(result.contains("[1] (relevance 0.92)"));

    let system = gateway.requests()[1].messages[0].content.clone().unwrap();
    assert!(system.contains("[1] The library is open"));
}

#[tokio::test]
async fn record_round_trip_preserves_waiting_task() {
    let gateway = PolicyGateway::new(|index, _| if index == 0 { clarification() } else { final_answer("ok") });
    let agent = build_agent(gateway, plan_toolkit(), limits(5, 2));
    let mut ctx = agent.new_context("my schedule").unwrap();
    agent.run(&mut ctx).await.unwrap();

    let record = ctx.to_record().unwrap();
    let mut restored = ConversationContext::from_record(record).unwrap();
    assert_eq!(restored, ctx);

    agent.resume(&mut restored, "4236").unwrap();
    assert!(matches!(agent.run(&mut restored).await.unwrap(), AgentOutcome::Completed { .. }));
}

#[tokio::test]
async fn service_streams_and_keeps_sessions_apart() {
    let gateway = PolicyGateway::new(|_, request| {
        let asked = request.messages[1].content.clone().unwrap_or_default();
        if asked.contains("schedule") {
            clarification()
        } else {
            final_answer("Hello!")
        }
    });
    let service = AgentService::new(build_agent(gateway, plan_toolkit(), limits(5, 2)));
    let (sink, mut rx) = ChannelSink::new();

    let outcome = service.process_message_streaming("bob", "hi", Arc::new(sink)).await.unwrap();
    assert_eq!(outcome.text(), "Hello!");

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(events.first(), Some(AgentStreamEvent::ToolCall { .. })));
    assert_eq!(events.last(), Some(&AgentStreamEvent::Finished));

    let waiting = service.process_message("alice", "my schedule").await.unwrap();
    assert!(matches!(waiting, AgentOutcome::ClarificationNeeded { .. }));

    assert_eq!(
        service.context("bob").await.unwrap().state(),
        AgentState::Completed
    );
    assert_eq!(
        service.context("alice").await.unwrap().state(),
        AgentState::WaitingForClarification
    );
    assert_eq!(service.session_count(), 2);
}
