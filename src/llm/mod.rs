//! Language model seam.
//!
//! The orchestrator talks to a [`LanguageModel`]; [`AnthropicClient`] is the
//! production implementation over the Anthropic Messages API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::{ToolCall, ToolResult, ToolSpec};

mod anthropic;

pub use anthropic::{AnthropicClient, resolve_model};

/// Errors from model calls.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of turn content, shaped like the Messages API content blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnContent {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

/// A single exchange with the model. The conversation is an append-only `Vec<AgentTurn>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentTurn {
    pub role: Role,
    pub content: Vec<TurnContent>,
}

impl AgentTurn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![TurnContent::Text { text: text.into() }],
        }
    }

    /// A user turn answering the model's tool calls.
    pub fn tool_results(results: &[ToolResult]) -> Self {
        Self {
            role: Role::User,
            content: results
                .iter()
                .map(|r| TurnContent::ToolResult {
                    tool_use_id: r.call_id.clone(),
                    content: r.payload.clone(),
                    is_error: !r.success,
                })
                .collect(),
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    /// The model finished its turn
    #[default]
    EndTurn,
    /// The model is waiting on tool results
    ToolUse,
    /// The reply hit the output token limit and is cut off
    MaxTokens,
    StopSequence,
    Other,
}

/// What the model answered: optional text plus any tool calls it wants made.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
}

impl ModelReply {
    pub fn final_answer(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
            stop_reason: StopReason::EndTurn,
        }
    }

    /// A reply cut off by the output token limit.
    pub fn truncated(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
            stop_reason: StopReason::MaxTokens,
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: None,
            tool_calls,
            stop_reason: StopReason::ToolUse,
        }
    }

    /// The assistant turn to append to the conversation.
    pub fn to_turn(&self) -> AgentTurn {
        let mut content = Vec::with_capacity(self.tool_calls.len() + 1);
        if let Some(text) = &self.text {
            if !text.is_empty() {
                content.push(TurnContent::Text { text: text.clone() });
            }
        }
        for call in &self.tool_calls {
            content.push(TurnContent::ToolUse {
                id: call.id.clone(),
                name: call.tool_name.clone(),
                input: Value::Object(call.arguments.clone()),
            });
        }
        AgentTurn {
            role: Role::Assistant,
            content,
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send the conversation so far and return the model's next reply.
    async fn complete(
        &self,
        system: &str,
        turns: &[AgentTurn],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, ModelError>;
}
