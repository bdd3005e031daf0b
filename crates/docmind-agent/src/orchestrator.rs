//! The agent state machine.
//!
//! Each session runs a bounded plan/act/observe loop: the planner decides an
//! action from the query and the trace so far, the registry executes it, and
//! the observation is appended to the trace. The loop ends with a final
//! answer, a failure, or truncation at the step limit.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use docmind_core::{
    Action, AgentConfig, AgentSession, DocmindError, Observation, Planner, Query, SessionStatus,
};

use crate::cancel::CancelHandle;
use crate::registry::ToolRegistry;

/// Drives one session per query. Sessions are independent; the orchestrator
/// itself is stateless between runs and can be shared.
pub struct Orchestrator<PL> {
    planner: Arc<PL>,
    registry: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl<PL> Orchestrator<PL>
where
    PL: Planner,
{
    pub fn new(planner: Arc<PL>, registry: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            planner,
            registry,
            config,
        }
    }

    /// Run a session to a terminal state. Never returns a `Running` session.
    ///
    /// Every planning cycle appends exactly one step, so the trace length
    /// never exceeds `max_steps`. Failures inside the loop are recorded as
    /// observations or terminal status, not propagated as errors.
    pub async fn run(&self, query: Query, cancel: CancelHandle) -> AgentSession {
        let mut session = AgentSession::new(query);
        info!(session_id = %session.id, query_id = %session.query.id, "session started");

        while (session.trace.len() as u32) < self.config.max_steps {
            if cancel.is_cancelled() {
                info!(session_id = %session.id, "session cancelled");
                return self.fail(session, DocmindError::Cancelled.code());
            }

            let action = match self.plan_with_retries(&session).await {
                Ok(action) => action,
                Err(err) => {
                    warn!(session_id = %session.id, error = %err, "planning exhausted");
                    return self.fail(session, err.code());
                }
            };

            match action {
                Action::FinalAnswer { text } => {
                    session.record_step(
                        Action::FinalAnswer { text: text.clone() },
                        Observation::Output {
                            value: serde_json::json!({ "answer": text }),
                        },
                    );
                    session.status = SessionStatus::Succeeded;
                    session.final_answer = Some(text);
                    info!(session_id = %session.id, steps = session.trace.len(), "session succeeded");
                    return session;
                }
                Action::ToolCall { name, arguments } => {
                    let observation = self.execute_tool(&name, arguments.clone()).await;
                    let terminal_failure = match &observation {
                        Observation::Error { code, .. } => {
                            let retryable = self
                                .registry
                                .spec(&name)
                                .map(|spec| spec.retryable)
                                .unwrap_or(false);
                            if retryable {
                                // Recorded in the trace; the planner gets a
                                // chance to route around it.
                                None
                            } else {
                                Some(code.clone())
                            }
                        }
                        Observation::Output { .. } => None,
                    };

                    session.record_step(Action::ToolCall { name, arguments }, observation);

                    if let Some(code) = terminal_failure {
                        return self.fail(session, &code);
                    }
                }
            }
        }

        // Step limit reached without a final answer.
        session.status = SessionStatus::Truncated;
        session.partial = true;
        session.final_answer = partial_answer(&session);
        info!(session_id = %session.id, steps = session.trace.len(), "session truncated");
        session
    }

    fn fail(&self, mut session: AgentSession, reason: &str) -> AgentSession {
        session.status = SessionStatus::Failed;
        session.failure_reason = Some(reason.to_string());
        session
    }

    /// Ask the planner for the next action, retrying malformed or transient
    /// planning failures within `max_plan_retries`. Each attempt runs under
    /// `plan_timeout_ms`; elapse counts as a transient failure.
    async fn plan_with_retries(&self, session: &AgentSession) -> docmind_core::Result<Action> {
        let attempts = 1 + self.config.max_plan_retries;
        let mut last_err = None;

        for attempt in 1..=attempts {
            let plan = self.planner.plan(&session.query, &session.trace);
            let result = match tokio::time::timeout(
                Duration::from_millis(self.config.plan_timeout_ms),
                plan,
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(DocmindError::Timeout {
                    operation: "planning".to_string(),
                    millis: self.config.plan_timeout_ms,
                }),
            };

            match result {
                Ok(action) => return Ok(action),
                Err(err) if matches!(err, DocmindError::Planning { .. }) || err.is_transient() => {
                    warn!(session_id = %session.id, attempt, error = %err, "planning attempt failed");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or_else(|| DocmindError::planning("no planning attempts made")))
    }

    /// Execute one tool call, including its timeout and retry budget, and
    /// fold the outcome into an observation.
    async fn execute_tool(&self, name: &str, arguments: serde_json::Value) -> Observation {
        let (retryable, budget) = match self.registry.spec(name) {
            Some(spec) => (
                spec.retryable,
                spec.max_retries.unwrap_or(self.config.tool_max_retries),
            ),
            None => (false, 0),
        };
        let attempts = if retryable { 1 + budget } else { 1 };

        let mut last_err = None;
        for attempt in 1..=attempts {
            let call = self.registry.invoke(name, arguments.clone());
            let result = match tokio::time::timeout(
                Duration::from_millis(self.config.tool_timeout_ms),
                call,
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(DocmindError::Timeout {
                    operation: format!("tool '{}'", name),
                    millis: self.config.tool_timeout_ms,
                }),
            };

            match result {
                Ok(value) => return Observation::Output { value },
                Err(err) if err.is_transient() && attempt < attempts => {
                    warn!(tool = name, attempt, error = %err, "tool attempt failed, retrying");
                    last_err = Some(err);
                }
                Err(err) => {
                    warn!(tool = name, attempt, error = %err, "tool call failed");
                    return Observation::Error {
                        code: err.code().to_string(),
                        message: err.to_string(),
                    };
                }
            }
        }

        let err = last_err.unwrap_or_else(|| DocmindError::provider("tool retry budget exhausted"));
        Observation::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Best-available answer for a truncated session: the most recent
/// successful observation, rendered compactly.
fn partial_answer(session: &AgentSession) -> Option<String> {
    session.trace.iter().rev().find_map(|step| match &step.observation {
        Observation::Output { value } => Some(format!(
            "Step limit reached before a final answer. Most recent result: {}",
            value
        )),
        Observation::Error { .. } => None,
    })
}
