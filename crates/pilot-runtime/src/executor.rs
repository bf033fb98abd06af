//! The tool execution step: run a batch of proposed calls against the backend.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use pilot_core::{Conversation, Identity, Message, PilotError, Result, ToolCall, ToolResult};
use pilot_tools::{RemoteClient, RemoteRequest, ToolRegistry};
use tracing::{debug, info, warn};

/// Results of one batch, in proposal order.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub results: Vec<ToolResult>,
    /// The input history with one tool-result message per call appended.
    pub history: Conversation,
    /// Set when a call failed because the deployment is misconfigured.
    pub config_error: Option<String>,
}

impl ExecutionReport {
    pub fn has_errors(&self) -> bool {
        self.results.iter().any(ToolResult::is_error)
    }
}

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    client: Arc<dyn RemoteClient>,
    call_timeout: Duration,
    parallel: bool,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, client: Arc<dyn RemoteClient>, call_timeout: Duration) -> Self {
        Self {
            registry,
            client,
            call_timeout,
            parallel: false,
        }
    }

    /// Allow read-only batches to be dispatched concurrently.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute `calls` on behalf of `identity`. One failing call never stops
    /// its siblings. Errors only when the results cannot be appended to
    /// `history`, i.e. the calls were never proposed there.
    pub async fn execute(
        &self,
        calls: &[ToolCall],
        identity: &Identity,
        history: &Conversation,
    ) -> Result<ExecutionReport> {
        let prepared: Vec<Result<RemoteRequest>> =
            calls.iter().map(|c| self.registry.prepare(c)).collect();

        let concurrent = self.parallel
            && calls.len() > 1
            && prepared
                .iter()
                .all(|p| matches!(p, Ok(r) if r.method.is_read_only()));

        debug!(calls = calls.len(), concurrent, "executing tool batch");

        let outcomes: Vec<(ToolResult, bool)> = if concurrent {
            join_all(
                calls
                    .iter()
                    .zip(prepared)
                    .map(|(call, request)| self.dispatch(call, request, identity)),
            )
            .await
        } else {
            let mut outcomes = Vec::with_capacity(calls.len());
            for (call, request) in calls.iter().zip(prepared) {
                outcomes.push(self.dispatch(call, request, identity).await);
            }
            outcomes
        };

        let mut config_error = None;
        let mut results = Vec::with_capacity(outcomes.len());
        for (result, is_config) in outcomes {
            if is_config && config_error.is_none() {
                config_error = Some(result.content());
            }
            results.push(result);
        }

        let history = history.extended(results.iter().cloned().map(Message::ToolResult))?;

        Ok(ExecutionReport {
            results,
            history,
            config_error,
        })
    }

    /// Run one call. Returns the result and whether it failed on configuration.
    async fn dispatch(
        &self,
        call: &ToolCall,
        request: Result<RemoteRequest>,
        identity: &Identity,
    ) -> (ToolResult, bool) {
        let request = match request {
            Ok(r) => r,
            Err(e) => {
                warn!(tool = %call.tool_name, call_id = %call.id, error = %e, "rejected tool call");
                return (ToolResult::error(call, e.to_string()), false);
            }
        };

        let outcome = match tokio::time::timeout(
            self.call_timeout,
            self.client.invoke(&request, identity),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(PilotError::Timeout {
                tool: call.tool_name.clone(),
                secs: self.call_timeout.as_secs_f64().ceil() as u64,
            }),
        };

        match outcome {
            Ok(value) => {
                info!(tool = %call.tool_name, call_id = %call.id, "tool call succeeded");
                (ToolResult::success(call, value), false)
            }
            Err(e) => {
                warn!(tool = %call.tool_name, call_id = %call.id, error = %e, "tool call failed");
                let is_config = e.is_config();
                (ToolResult::error(call, e.to_string()), is_config)
            }
        }
    }
}
