//! The reasoning step: one call to the language model per invocation.

use std::sync::Arc;

use async_trait::async_trait;
use pilot_config::AgentConfig;
use pilot_core::{Conversation, Message, Result, ToolCall, ToolDefinition};
use pilot_llm::{LlmProvider, LlmRequest};
use tracing::{debug, warn};

/// What the model decided for this step.
#[derive(Debug, Clone)]
pub enum ReasoningOutcome {
    /// Non-empty list of calls; `history` already holds the proposing message.
    ProposeTools {
        tool_calls: Vec<ToolCall>,
        history: Conversation,
    },
    /// Terminal text; `history` already ends with it.
    Respond {
        text: String,
        history: Conversation,
        needs_clarification: bool,
        /// The text is the fixed apology, not a model answer.
        failed: bool,
    },
}

#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Run one reasoning step. `user_input`, when given, is appended as the
    /// human turn first. Never fails: problems become an apology response.
    async fn reason(
        &self,
        history: &Conversation,
        user_input: Option<&str>,
        tools: &[ToolDefinition],
    ) -> ReasoningOutcome;
}

/// Decides whether a reply is asking the user for more information.
pub trait ClarificationDetector: Send + Sync {
    fn is_clarification(&self, text: &str) -> bool;
}

/// Flags replies containing a question mark or any configured keyword.
#[derive(Debug, Clone)]
pub struct KeywordDetector {
    keywords: Vec<String>,
}

impl KeywordDetector {
    pub fn new(keywords: Vec<String>) -> Self {
        Self { keywords }
    }
}

impl Default for KeywordDetector {
    fn default() -> Self {
        Self::new(AgentConfig::default().clarification_keywords)
    }
}

impl ClarificationDetector for KeywordDetector {
    fn is_clarification(&self, text: &str) -> bool {
        text.contains('?')
            || text.contains('？')
            || self
                .keywords
                .iter()
                .any(|k| !k.is_empty() && text.contains(k.as_str()))
    }
}

/// Model identifier without the "provider/" prefix.
pub fn provider_model(model: &str) -> &str {
    model.split_once('/').map(|(_, m)| m).unwrap_or(model)
}

/// Reasoner backed by an [`LlmProvider`].
pub struct LlmReasoner {
    provider: Arc<dyn LlmProvider>,
    model: String,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
    detector: Box<dyn ClarificationDetector>,
    failure_reply: String,
}

impl LlmReasoner {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let defaults = AgentConfig::default();
        Self {
            provider,
            model: model.into(),
            system_prompt: system_prompt.into(),
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            detector: Box::new(KeywordDetector::default()),
            failure_reply: defaults.replies.reasoning_failure,
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, agent: &AgentConfig) -> Result<Self> {
        Ok(Self {
            provider,
            model: provider_model(&agent.model).to_string(),
            system_prompt: agent.resolve_system_prompt()?,
            max_tokens: agent.max_tokens,
            temperature: agent.temperature,
            detector: Box::new(KeywordDetector::new(agent.clarification_keywords.clone())),
            failure_reply: agent.replies.reasoning_failure.clone(),
        })
    }

    pub fn with_detector(mut self, detector: Box<dyn ClarificationDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_failure_reply(mut self, reply: impl Into<String>) -> Self {
        self.failure_reply = reply.into();
        self
    }

    fn fail(&self, mut history: Conversation) -> ReasoningOutcome {
        history.push_reply(self.failure_reply.clone());
        ReasoningOutcome::Respond {
            text: self.failure_reply.clone(),
            history,
            needs_clarification: false,
            failed: true,
        }
    }
}

#[async_trait]
impl Reasoner for LlmReasoner {
    async fn reason(
        &self,
        history: &Conversation,
        user_input: Option<&str>,
        tools: &[ToolDefinition],
    ) -> ReasoningOutcome {
        let mut history = history.clone();
        if let Some(input) = user_input {
            history.push_human(input);
        }

        let request = LlmRequest {
            model: self.model.clone(),
            messages: history.messages().to_vec(),
            tools: tools.to_vec(),
            system: Some(self.system_prompt.clone()),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = match self.provider.complete(&request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "reasoning call failed");
                return self.fail(history);
            }
        };
        debug!(
            tool_calls = response.tool_calls.len(),
            tokens = response.usage.total_tokens(),
            stop_reason = ?response.stop_reason,
            "reasoning step complete"
        );

        if response.has_tool_calls() {
            let tool_calls = response.tool_calls.clone();
            let proposal = Message::Assistant {
                text: response.text,
                tool_calls: response.tool_calls,
            };
            return match history.push(proposal) {
                Ok(()) => ReasoningOutcome::ProposeTools { tool_calls, history },
                Err(e) => {
                    warn!(error = %e, "model proposed unusable tool calls");
                    self.fail(history)
                }
            };
        }

        let text = response.text.trim().to_string();
        if text.is_empty() {
            warn!("model returned neither text nor tool calls");
            return self.fail(history);
        }

        let needs_clarification = self.detector.is_clarification(&text);
        history.push_reply(text.clone());
        ReasoningOutcome::Respond {
            text,
            history,
            needs_clarification,
            failed: false,
        }
    }
}
