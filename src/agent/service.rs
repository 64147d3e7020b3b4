//! Per-user sessions over a shared [`SgrAgent`].
//!
//! Each user id owns at most one live [`ConversationContext`] and a short history of
//! question/answer turns. Messages for the same user are serialized by a per-session lock;
//! different users run concurrently. A turn runs on a copy of the session's context and
//! the copy replaces the stored one only when the run succeeds.
//!
//! A new task opens with the session's most recent turns so follow-up questions keep their
//! referents. Sessions live until the caller drops them with [`AgentService::reset`] or
//! sweeps them with [`AgentService::evict_idle`].

use crate::agent::context::{AgentState, ConversationContext};
use crate::agent::sgr_agent::{AgentOutcome, SgrAgent};
use crate::error::Result;
use crate::llm::models::LlmMessage;
use crate::streaming::StreamSink;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Question/answer turns replayed into a new task by default
pub const DEFAULT_HISTORY_TURNS: usize = 10;

#[derive(Debug)]
struct Session {
    context: Option<ConversationContext>,
    history: Vec<LlmMessage>,
    last_active: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            context: None,
            history: Vec::new(),
            last_active: Instant::now(),
        }
    }
}

impl Session {
    /// Last `turns` question/answer pairs
    fn recent_turns(&self, turns: usize) -> &[LlmMessage] {
        let keep = turns.saturating_mul(2).min(self.history.len());
        &self.history[self.history.len() - keep..]
    }
}

pub struct AgentService {
    agent: SgrAgent,
    sessions: DashMap<String, Arc<Mutex<Session>>>,
    history_turns: usize,
}

impl AgentService {
    pub fn new(agent: SgrAgent) -> Self {
        Self {
            agent,
            sessions: DashMap::new(),
            history_turns: DEFAULT_HISTORY_TURNS,
        }
    }

    /// Replay at most `turns` earlier question/answer pairs into each new task; zero disables it
    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    pub fn agent(&self) -> &SgrAgent {
        &self.agent
    }

    fn session(&self, user_id: &str) -> Arc<Mutex<Session>> {
        Arc::clone(self.sessions.entry(user_id.to_string()).or_default().value())
    }

    /// Handle one user message.
    ///
    /// A message to a session waiting for clarification answers the pending questions;
    /// any other message starts a new task.
    pub async fn process_message(&self, user_id: &str, message: &str) -> Result<AgentOutcome> {
        self.process_with(&self.agent, user_id, message).await
    }

    /// Like [`process_message`](Self::process_message), streaming output to `sink`
    pub async fn process_message_streaming(
        &self,
        user_id: &str,
        message: &str,
        sink: Arc<dyn StreamSink>,
    ) -> Result<AgentOutcome> {
        let agent = self.agent.with_sink(sink);
        self.process_with(&agent, user_id, message).await
    }

    async fn process_with(&self, agent: &SgrAgent, user_id: &str, message: &str) -> Result<AgentOutcome> {
        let session = self.session(user_id);
        let mut session = session.lock().await;

        let mut ctx = match &session.context {
            Some(ctx) if ctx.state() == AgentState::WaitingForClarification => {
                info!(user_id, task_id = %ctx.task_id, "Resuming task with clarification");
                let mut ctx = ctx.clone();
                agent.resume(&mut ctx, message)?;
                ctx
            }
            _ => {
                let prior = session.recent_turns(self.history_turns);
                let ctx = agent.new_context_with_history(message, prior)?;
                info!(user_id, task_id = %ctx.task_id, prior_messages = prior.len(), "Starting new task");
                ctx
            }
        };

        match agent.run(&mut ctx).await {
            Ok(outcome) => {
                session.history.push(LlmMessage::user(message));
                session.history.push(LlmMessage::assistant(outcome.text()));
                session.context = Some(ctx);
                session.last_active = Instant::now();
                Ok(outcome)
            }
            Err(e) => {
                error!(user_id, error = %e, "Message processing failed; session left unchanged");
                Err(e)
            }
        }
    }

    /// Question/answer turns of successful messages, oldest first
    pub async fn history(&self, user_id: &str) -> Vec<LlmMessage> {
        match self.sessions.get(user_id).map(|s| Arc::clone(s.value())) {
            Some(session) => session.lock().await.history.clone(),
            None => Vec::new(),
        }
    }

    /// Snapshot of the user's current task context
    pub async fn context(&self, user_id: &str) -> Option<ConversationContext> {
        let session = self.sessions.get(user_id).map(|s| Arc::clone(s.value()))?;
        let session = session.lock().await;
        session.context.clone()
    }

    /// Drop the user's session once its running turn, if any, has finished.
    ///
    /// Returns whether a session was removed.
    pub async fn reset(&self, user_id: &str) -> bool {
        let Some(session) = self.sessions.get(user_id).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        let _guard = session.lock().await;
        self.sessions
            .remove_if(user_id, |_, stored| Arc::ptr_eq(stored, &session))
            .is_some()
    }

    /// Drop sessions untouched for at least `max_idle`; busy sessions are kept.
    ///
    /// Returns the number of sessions removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| match session.try_lock() {
            Ok(session) => session.last_active.elapsed() < max_idle,
            Err(_) => true,
        });
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            debug!(evicted, "Evicted idle sessions");
        }
        evicted
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
