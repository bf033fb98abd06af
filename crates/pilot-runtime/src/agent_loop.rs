//! The agent control loop.
//!
//! One call to [`Agent::run`] handles one user turn: it alternates between
//! reasoning and tool execution until the model answers, asks for
//! clarification, a tool fails, or the cycle bound is reached.

use std::sync::Arc;
use std::time::Duration;

use pilot_config::{AgentConfig, PilotConfig, RepliesConfig};
use pilot_core::{
    Conversation, Credential, Identity, Message, PersistedMessage, PilotError, Result, SubjectId,
    ToolCall, ToolDefinition, ToolResult,
};
use pilot_llm::LlmProvider;
use pilot_tools::{RemoteClient, ToolRegistry};
use serde::Serialize;
use tracing::{info, warn};

use crate::executor::ToolExecutor;
use crate::reasoning::{LlmReasoner, Reasoner, ReasoningOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Reasoning,
    Executing,
    Clarifying,
    Done,
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Answered,
    Clarification,
    ToolFailure,
    CycleLimit,
    AuthorizationRequired,
    ReasoningFailed,
    InvalidHistory,
    ConfigurationError,
}

/// Everything the loop needs for one turn.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub user_input: String,
    pub prior_history: Vec<PersistedMessage>,
    pub credential: Option<Credential>,
    pub subject_id: Option<SubjectId>,
}

#[derive(Debug, Clone)]
pub struct TurnOutput {
    /// Natural-language text for the user. Never empty.
    pub reply: String,
    /// Prior history plus everything this turn added.
    pub history: Conversation,
    /// Records added by this turn, for the caller to persist.
    pub appended: Vec<PersistedMessage>,
    pub outcome: RunOutcome,
    /// Tool batches executed.
    pub cycles: u32,
}

/// Working state threaded through a single turn.
#[derive(Debug)]
pub struct RunState {
    pub user_input: String,
    pub history: Conversation,
    pub pending_tool_calls: Vec<ToolCall>,
    pub final_reply: Option<String>,
    pub needs_clarification: bool,
    pub identity: Option<Identity>,
    pub cycles: u32,
}

pub struct Agent {
    reasoner: Arc<dyn Reasoner>,
    executor: ToolExecutor,
    tools: Vec<ToolDefinition>,
    replies: RepliesConfig,
    max_cycles: u32,
}

impl Agent {
    pub fn new(reasoner: Arc<dyn Reasoner>, executor: ToolExecutor) -> Self {
        let tools = executor.registry().definitions();
        let defaults = AgentConfig::default();
        Self {
            reasoner,
            executor,
            tools,
            replies: defaults.replies,
            max_cycles: defaults.max_cycles,
        }
    }

    pub fn with_replies(mut self, replies: RepliesConfig) -> Self {
        self.replies = replies;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: u32) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Wire an agent from configuration with the given model provider and backend client.
    pub fn from_config(
        config: &PilotConfig,
        provider: Arc<dyn LlmProvider>,
        client: Arc<dyn RemoteClient>,
    ) -> Result<Self> {
        let registry = Arc::new(ToolRegistry::builtin()?);
        let reasoner = LlmReasoner::from_config(provider, &config.agent)?;
        let executor = ToolExecutor::new(
            registry,
            client,
            Duration::from_secs(config.backend.call_timeout_secs),
        )
        .with_parallel(config.agent.parallel_tool_calls);

        Ok(Self::new(Arc::new(reasoner), executor)
            .with_replies(config.agent.replies.clone())
            .with_max_cycles(config.agent.max_cycles))
    }

    /// Tool schemas offered to the model.
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Handle one user turn. Never fails; every problem becomes a reply.
    pub async fn run(&self, input: TurnInput) -> TurnOutput {
        let prior = match Conversation::from_records(&input.prior_history) {
            Ok(conversation) => conversation,
            Err(e) => {
                warn!(error = %e, "prior history rejected");
                return TurnOutput {
                    reply: self.replies.invalid_history.clone(),
                    history: Conversation::new(),
                    appended: vec![],
                    outcome: RunOutcome::InvalidHistory,
                    cycles: 0,
                };
            }
        };
        let mark = prior.len();

        let mut state = RunState {
            user_input: input.user_input,
            history: prior,
            pending_tool_calls: vec![],
            final_reply: None,
            needs_clarification: false,
            identity: Identity::from_parts(input.credential, input.subject_id),
            cycles: 0,
        };
        let mut outcome = RunOutcome::Answered;
        let mut current = LoopState::Reasoning;
        let mut first_step = true;

        while current != LoopState::Done {
            current = match current {
                LoopState::Reasoning => {
                    let user_input = first_step.then_some(state.user_input.as_str());
                    first_step = false;
                    let step = self
                        .reasoner
                        .reason(&state.history, user_input, &self.tools)
                        .await;
                    self.after_reasoning(&mut state, step, &mut outcome)
                }
                LoopState::Executing => self.execute_pending(&mut state, &mut outcome).await,
                LoopState::Clarifying => {
                    outcome = RunOutcome::Clarification;
                    LoopState::Done
                }
                LoopState::Done => LoopState::Done,
            };
        }

        let reply = match state.final_reply.take() {
            Some(reply) if !reply.trim().is_empty() => reply,
            _ => {
                let fallback = self.replies.reasoning_failure.clone();
                state.history.push_reply(fallback.clone());
                fallback
            }
        };
        let appended = state.history.records_since(mark);
        info!(
            outcome = ?outcome,
            cycles = state.cycles,
            appended = appended.len(),
            subject = ?input.subject_id,
            "turn finished"
        );

        TurnOutput {
            reply,
            history: state.history,
            appended,
            outcome,
            cycles: state.cycles,
        }
    }

    fn after_reasoning(
        &self,
        state: &mut RunState,
        step: ReasoningOutcome,
        outcome: &mut RunOutcome,
    ) -> LoopState {
        match step {
            ReasoningOutcome::ProposeTools {
                tool_calls,
                history,
            } => {
                state.history = history;
                if state.identity.is_none() {
                    warn!("tool calls proposed without a credential and user id");
                    *outcome = RunOutcome::AuthorizationRequired;
                    let reply = self.replies.authorization_required.clone();
                    self.abandon(state, &tool_calls, "authorization required", &reply);
                    LoopState::Done
                } else if state.cycles >= self.max_cycles {
                    warn!(cycles = state.cycles, max = self.max_cycles, "cycle limit reached");
                    *outcome = RunOutcome::CycleLimit;
                    let reply = self.replies.cycle_limit.clone();
                    self.abandon(state, &tool_calls, "cycle limit reached", &reply);
                    LoopState::Done
                } else {
                    state.pending_tool_calls = tool_calls;
                    LoopState::Executing
                }
            }
            ReasoningOutcome::Respond {
                text,
                history,
                needs_clarification,
                failed,
            } => {
                state.history = history;
                state.final_reply = Some(text);
                state.needs_clarification = needs_clarification && !failed;
                if failed {
                    *outcome = RunOutcome::ReasoningFailed;
                    LoopState::Done
                } else if needs_clarification {
                    LoopState::Clarifying
                } else {
                    *outcome = RunOutcome::Answered;
                    LoopState::Done
                }
            }
        }
    }

    async fn execute_pending(&self, state: &mut RunState, outcome: &mut RunOutcome) -> LoopState {
        let calls = std::mem::take(&mut state.pending_tool_calls);
        state.cycles += 1;
        info!(cycle = state.cycles, calls = calls.len(), "executing tool calls");

        let report = match &state.identity {
            Some(identity) => self.executor.execute(&calls, identity, &state.history).await,
            None => Err(PilotError::AuthorizationRequired),
        };

        match report {
            Ok(report) => {
                state.history = report.history;
                if let Some(detail) = report.config_error {
                    warn!(detail = %detail, "backend is misconfigured");
                    *outcome = RunOutcome::ConfigurationError;
                    let reply = self.replies.configuration.clone();
                    self.finish(state, &reply);
                    LoopState::Done
                } else if report.results.iter().any(ToolResult::is_error) {
                    *outcome = RunOutcome::ToolFailure;
                    let reply = self.replies.tool_failure.clone();
                    self.finish(state, &reply);
                    LoopState::Done
                } else {
                    LoopState::Reasoning
                }
            }
            Err(e) => {
                warn!(error = %e, "tool batch could not be recorded");
                *outcome = RunOutcome::ToolFailure;
                let reply = self.replies.tool_failure.clone();
                self.abandon(state, &calls, &e.to_string(), &reply);
                LoopState::Done
            }
        }
    }

    /// Record every call as not executed, then finish with `reply`.
    fn abandon(&self, state: &mut RunState, calls: &[ToolCall], reason: &str, reply: &str) {
        let skipped = calls.iter().map(|call| {
            Message::ToolResult(ToolResult::error(call, format!("not executed: {reason}")))
        });
        match state.history.extended(skipped) {
            Ok(history) => state.history = history,
            Err(e) => warn!(error = %e, "could not record skipped tool calls"),
        }
        self.finish(state, reply);
    }

    fn finish(&self, state: &mut RunState, reply: &str) {
        state.pending_tool_calls.clear();
        state.final_reply = Some(reply.to_string());
        state.history.push_reply(reply);
    }
}
