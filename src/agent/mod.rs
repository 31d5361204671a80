//! The documentation agent: a bounded model ⇄ tool loop.
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! Running ──tool calls──▶ ToolCallPending ──results──▶ Running
//!    │                          │
//!    ├─final answer──▶ Done     └─channel down──▶ ChannelUnavailable
//!    └─budget spent──▶ BudgetExceeded
//! ```

use std::sync::Arc;

use crate::applier::Baseline;
use crate::channel::{
    ChannelError, GET_FILE_CONTENTS, ToolCall, ToolChannel, ToolResult, ToolSpec, WRITE_TOOLS, file_sha,
};
use crate::error::RunError;
use crate::llm::{AgentTurn, LanguageModel, ModelError, StopReason};
use crate::request::DocumentationRequest;

pub mod prompt;

#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Running,
    ToolCallPending(Vec<ToolCall>),
    Done(String),
    BudgetExceeded,
    ChannelUnavailable(String),
}

/// A finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The model's final answer
    pub answer: String,
    pub turns: Vec<AgentTurn>,
    /// Model calls made
    pub iterations: usize,
}

pub struct Orchestrator {
    model: Arc<dyn LanguageModel>,
    channel: Arc<dyn ToolChannel>,
    max_iterations: usize,
    base_branch: String,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        channel: Arc<dyn ToolChannel>,
        max_iterations: usize,
        base_branch: impl Into<String>,
    ) -> Self {
        Self {
            model,
            channel,
            max_iterations,
            base_branch: base_branch.into(),
        }
    }

    /// Drive the model until it gives a final answer or a terminal state is reached.
    ///
    /// Files the model reads are recorded in `baseline` so the applier can tell
    /// whether they changed before the answer is written back.
    pub async fn run(
        &self,
        request: &DocumentationRequest,
        baseline: &mut Baseline,
    ) -> Result<RunOutcome, RunError> {
        let tools: Vec<ToolSpec> = self
            .channel
            .list_tools()
            .await?
            .into_iter()
            .filter(|t| !WRITE_TOOLS.contains(&t.name.as_str()))
            .collect();
        tracing::debug!(
            "Offering {} tools to the model: {:?}",
            tools.len(),
            tools.iter().map(|t| &t.name).collect::<Vec<_>>()
        );

        let system = prompt::system_prompt(request);
        let mut turns = vec![AgentTurn::user_text(prompt::request_message(request))];
        let mut iterations = 0;
        let mut state = RunState::Running;

        loop {
            state = match state {
                RunState::Running => {
                    if iterations >= self.max_iterations {
                        RunState::BudgetExceeded
                    } else {
                        iterations += 1;
                        let reply = self.model.complete(&system, &turns, &tools).await?;
                        // A cut-off reply is not an answer, even without tool calls
                        if reply.stop_reason == StopReason::MaxTokens {
                            return Err(ModelError::InvalidResponse(
                                "reply cut off by the output token limit".to_string(),
                            )
                            .into());
                        }
                        turns.push(reply.to_turn());
                        if reply.tool_calls.is_empty() {
                            RunState::Done(reply.text.unwrap_or_default())
                        } else {
                            RunState::ToolCallPending(reply.tool_calls)
                        }
                    }
                }
                RunState::ToolCallPending(calls) => {
                    self.dispatch(request, calls, &tools, &mut turns, baseline).await
                }
                RunState::Done(answer) => {
                    tracing::info!(
                        "{} finished after {} iterations",
                        request.source_event_id,
                        iterations
                    );
                    return Ok(RunOutcome {
                        answer,
                        turns,
                        iterations,
                    });
                }
                RunState::BudgetExceeded => {
                    tracing::warn!(
                        "{} exceeded its budget of {} iterations",
                        request.source_event_id,
                        self.max_iterations
                    );
                    return Err(RunError::BudgetExceeded {
                        limit: self.max_iterations,
                    });
                }
                RunState::ChannelUnavailable(reason) => {
                    tracing::error!("{}: {}", request.source_event_id, reason);
                    return Err(RunError::ChannelUnavailable(reason));
                }
            };
        }
    }

    /// Run one batch of tool calls and record their results as a single turn.
    async fn dispatch(
        &self,
        request: &DocumentationRequest,
        calls: Vec<ToolCall>,
        tools: &[ToolSpec],
        turns: &mut Vec<AgentTurn>,
        baseline: &mut Baseline,
    ) -> RunState {
        let mut results = Vec::with_capacity(calls.len());
        let mut next = RunState::Running;

        for call in &calls {
            // Once the channel is down every remaining call gets the same answer
            if let RunState::ChannelUnavailable(reason) = &next {
                results.push(ToolResult::failure(call, reason.clone()));
                continue;
            }

            if !tools.iter().any(|t| t.name == call.tool_name) {
                tracing::warn!("Model called unavailable tool {}", call.tool_name);
                results.push(ToolResult::failure(
                    call,
                    format!("tool '{}' is not available", call.tool_name),
                ));
                continue;
            }

            match self.channel.call(call).await {
                Ok(result) => {
                    if !result.success {
                        tracing::warn!("Tool {} failed: {}", call.tool_name, result.payload);
                    }
                    self.record_read(request, call, &result, baseline);
                    results.push(result);
                }
                Err(ChannelError::Unavailable(reason)) => {
                    results.push(ToolResult::failure(call, reason.clone()));
                    next = RunState::ChannelUnavailable(reason);
                }
            }
        }

        turns.push(AgentTurn::tool_results(&results));
        next
    }

    /// Remember the sha of a file the model read from the request's repository
    /// on the base branch.
    fn record_read(
        &self,
        request: &DocumentationRequest,
        call: &ToolCall,
        result: &ToolResult,
        baseline: &mut Baseline,
    ) {
        if call.tool_name != GET_FILE_CONTENTS {
            return;
        }
        let arg = |name: &str| call.arguments.get(name).and_then(|v| v.as_str());

        // Calls that leave out owner or repo count as the request's repository
        let repository = &request.repository;
        let same_repository = arg("owner").is_none_or(|o| o.eq_ignore_ascii_case(&repository.owner))
            && arg("repo").is_none_or(|r| r.eq_ignore_ascii_case(&repository.name));
        let on_base = arg("branch").is_none_or(|b| b == self.base_branch);
        let Some(path) = arg("path").map(|p| p.trim_start_matches("./")) else {
            return;
        };
        if let (true, true, Some(sha)) = (same_repository, on_base, file_sha(result)) {
            baseline.observe(path, Some(sha));
        }
    }
}
