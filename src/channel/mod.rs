use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

mod mcp;

pub use mcp::McpChannel;

/// Reads a file from the repository. Arguments: `owner`, `repo`, `path`, optional `branch`.
pub const GET_FILE_CONTENTS: &str = "get_file_contents";
/// Creates or updates a file. Arguments: `owner`, `repo`, `path`, `content`, `message`, `branch`, optional `sha`.
pub const CREATE_OR_UPDATE_FILE: &str = "create_or_update_file";
/// Creates a branch. Arguments: `owner`, `repo`, `branch`, optional `from_branch`.
pub const CREATE_BRANCH: &str = "create_branch";
/// Opens a pull request. Arguments: `owner`, `repo`, `title`, `head`, `base`, `body`.
pub const CREATE_PULL_REQUEST: &str = "create_pull_request";
/// Fetches an issue. Arguments: `owner`, `repo`, `issue_number`.
pub const GET_ISSUE: &str = "get_issue";
/// Comments on an issue. Arguments: `owner`, `repo`, `issue_number`, `body`.
pub const ADD_ISSUE_COMMENT: &str = "add_issue_comment";

/// Tools that mutate the repository. These stay with the result applier and are
/// never offered to the model.
pub const WRITE_TOOLS: [&str; 4] = [
    CREATE_OR_UPDATE_FILE,
    CREATE_BRANCH,
    CREATE_PULL_REQUEST,
    ADD_ISSUE_COMMENT,
];

/// A tool advertised by the remote server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A request to invoke one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Pairs the call with its result in the model conversation
    pub id: String,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// The outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub payload: String,
    pub success: bool,
}

impl ToolResult {
    pub fn success(call: &ToolCall, payload: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            payload: payload.into(),
            success: true,
        }
    }

    pub fn failure(call: &ToolCall, payload: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            payload: payload.into(),
            success: false,
        }
    }

    /// Parse the payload as JSON, if it is JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.payload).ok()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The remote server could not be reached or did not answer in time.
    #[error("tool channel unavailable: {0}")]
    Unavailable(String),
}

/// Request/response access to a remote tool server.
///
/// Implementations never retry: a timeout or transport failure is returned as
/// [`ChannelError::Unavailable`] and left to the caller.
#[async_trait]
pub trait ToolChannel: Send + Sync {
    /// Tools the server currently advertises.
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ChannelError>;

    /// Invoke one tool. Tool-level failures come back as `Ok` with `success = false`.
    async fn call(&self, call: &ToolCall) -> Result<ToolResult, ChannelError>;
}

/// Build a call that the orchestrator or applier issues on its own behalf.
pub(crate) fn internal_call(tool_name: &str, arguments: Value) -> ToolCall {
    ToolCall::new(format!("internal-{tool_name}"), tool_name, arguments)
}

/// Extract the blob sha from a `get_file_contents` payload.
pub fn file_sha(result: &ToolResult) -> Option<String> {
    if !result.success {
        return None;
    }
    result
        .json()
        .and_then(|v| v.get("sha").and_then(Value::as_str).map(str::to_string))
}

/// Whether a failed `get_file_contents` means the file is absent, as opposed
/// to the server failing to answer (rate limits, 5xx).
pub fn is_missing_file(result: &ToolResult) -> bool {
    if result.success {
        return false;
    }
    let payload = result.payload.to_lowercase();
    payload.contains("file_not_found") || payload.contains("not found") || payload.contains("404")
}

/// Whether a failed `create_pull_request` was GitHub refusing a duplicate
/// pull request for the same head branch.
pub fn is_existing_pull_request(result: &ToolResult) -> bool {
    !result.success && result.payload.to_lowercase().contains("pull request already exists")
}
