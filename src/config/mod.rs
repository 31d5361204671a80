use std::time::Duration;

use serde::Serialize;

/// How finished documentation reaches the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyMode {
    /// Commit to `docs/issue-<n>` and open a pull request that resolves the issue
    PullRequest,
    /// Commit straight to the base branch
    Direct,
}

/// Everything a documentation run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Issue titles must contain this to trigger a run
    pub marker: String,
    pub max_iterations: usize,
    pub tool_timeout: Duration,
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub apply_mode: ApplyMode,
    pub base_branch: String,
    pub comment_on_issue: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            marker: "[Docs Agent]".to_string(),
            max_iterations: 25,
            tool_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(15 * 60),
            max_concurrent_requests: 4,
            apply_mode: ApplyMode::PullRequest,
            base_branch: "main".to_string(),
            comment_on_issue: false,
        }
    }
}

/// Credentials and endpoints for the external services.
#[derive(Clone)]
pub struct ConnectionConfig {
    pub anthropic_api_key: String,
    pub anthropic_base_url: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub mcp_server_url: String,
    pub mcp_access_token: Option<String>,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("anthropic_api_key", &"<redacted>")
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("mcp_server_url", &self.mcp_server_url)
            .field("mcp_access_token", &self.mcp_access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
