use rmcp::model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use serde::Deserialize;
use serde_json::json;

use rmcp::{Error as McpError, ServerHandler, schemars, tool};

use crate::github::GitHubConnector;

/// MCP tools over one GitHub account: the primitives the documentation agent needs.
#[derive(Clone)]
pub struct RepositoryTools {
    github: GitHubConnector,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetFileContentsRequest {
    #[schemars(description = "repository owner")]
    pub owner: String,
    #[schemars(description = "repository name")]
    pub repo: String,
    #[schemars(description = "path of the file within the repository")]
    pub path: String,
    #[schemars(description = "branch to read from, defaults to the repository's default branch")]
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateOrUpdateFileRequest {
    #[schemars(description = "repository owner")]
    pub owner: String,
    #[schemars(description = "repository name")]
    pub repo: String,
    #[schemars(description = "path of the file to write")]
    pub path: String,
    #[schemars(description = "complete new file content")]
    pub content: String,
    #[schemars(description = "commit message")]
    pub message: String,
    #[schemars(description = "branch to commit to")]
    pub branch: String,
    #[schemars(description = "sha of the blob being replaced; omit when creating a file")]
    #[serde(default)]
    pub sha: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateBranchRequest {
    #[schemars(description = "repository owner")]
    pub owner: String,
    #[schemars(description = "repository name")]
    pub repo: String,
    #[schemars(description = "name of the new branch")]
    pub branch: String,
    #[schemars(description = "branch to start from, defaults to the repository's default branch")]
    #[serde(default)]
    pub from_branch: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreatePullRequestRequest {
    #[schemars(description = "repository owner")]
    pub owner: String,
    #[schemars(description = "repository name")]
    pub repo: String,
    #[schemars(description = "pull request title")]
    pub title: String,
    #[schemars(description = "branch containing the changes")]
    pub head: String,
    #[schemars(description = "branch to merge into")]
    pub base: String,
    #[schemars(description = "pull request description")]
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IssueRequest {
    #[schemars(description = "repository owner")]
    pub owner: String,
    #[schemars(description = "repository name")]
    pub repo: String,
    #[schemars(description = "issue number")]
    pub issue_number: u64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddIssueCommentRequest {
    #[schemars(description = "repository owner")]
    pub owner: String,
    #[schemars(description = "repository name")]
    pub repo: String,
    #[schemars(description = "issue number")]
    pub issue_number: u64,
    #[schemars(description = "comment text, markdown")]
    pub body: String,
}

fn github_error(action: &str, err: anyhow::Error) -> McpError {
    tracing::error!("{} failed: {:#}", action, err);
    McpError::internal_error(format!("{action} failed: {err}"), None)
}

#[tool(tool_box)]
impl RepositoryTools {
    pub fn new(github: GitHubConnector) -> Self {
        Self { github }
    }

    #[tool(description = "Get the contents and blob sha of a file in a GitHub repository")]
    async fn get_file_contents(
        &self,
        #[tool(aggr)] GetFileContentsRequest { owner, repo, path, branch }: GetFileContentsRequest,
    ) -> Result<CallToolResult, McpError> {
        let file = self
            .github
            .get_file(&owner, &repo, &path, branch.as_deref())
            .await
            .map_err(|e| github_error("get_file_contents", e))?;

        match file {
            Some(file) => {
                let response = json!({
                    "path": file.path,
                    "sha": file.sha,
                    "content": file.content,
                });
                Ok(CallToolResult::success(vec![Content::text(response.to_string())]))
            }
            None => Err(McpError::resource_not_found(
                "file_not_found",
                Some(json!({ "path": path })),
            )),
        }
    }

    #[tool(description = "Create or update a single file in a GitHub repository")]
    async fn create_or_update_file(
        &self,
        #[tool(aggr)] CreateOrUpdateFileRequest { owner, repo, path, content, message, branch, sha }: CreateOrUpdateFileRequest,
    ) -> Result<CallToolResult, McpError> {
        let new_sha = self
            .github
            .put_file(&owner, &repo, &path, &content, &message, &branch, sha.as_deref())
            .await
            .map_err(|e| github_error("create_or_update_file", e))?;

        let response = json!({
            "path": path,
            "branch": branch,
            "sha": new_sha,
        });
        Ok(CallToolResult::success(vec![Content::text(response.to_string())]))
    }

    #[tool(description = "Create a new branch in a GitHub repository")]
    async fn create_branch(
        &self,
        #[tool(aggr)] CreateBranchRequest { owner, repo, branch, from_branch }: CreateBranchRequest,
    ) -> Result<CallToolResult, McpError> {
        let sha = self
            .github
            .create_branch(&owner, &repo, &branch, from_branch.as_deref())
            .await
            .map_err(|e| github_error("create_branch", e))?;

        let response = json!({ "branch": branch, "sha": sha });
        Ok(CallToolResult::success(vec![Content::text(response.to_string())]))
    }

    #[tool(description = "Open a pull request in a GitHub repository")]
    async fn create_pull_request(
        &self,
        #[tool(aggr)] CreatePullRequestRequest { owner, repo, title, head, base, body }: CreatePullRequestRequest,
    ) -> Result<CallToolResult, McpError> {
        let pr = self
            .github
            .create_pull_request(&owner, &repo, &title, &head, &base, &body)
            .await
            .map_err(|e| github_error("create_pull_request", e))?;

        let response = json!({ "number": pr.number, "html_url": pr.html_url });
        Ok(CallToolResult::success(vec![Content::text(response.to_string())]))
    }

    #[tool(description = "Get the title and body of an issue in a GitHub repository")]
    async fn get_issue(
        &self,
        #[tool(aggr)] IssueRequest { owner, repo, issue_number }: IssueRequest,
    ) -> Result<CallToolResult, McpError> {
        let (title, body) = self
            .github
            .get_issue(&owner, &repo, issue_number)
            .await
            .map_err(|e| github_error("get_issue", e))?;

        let response = json!({ "number": issue_number, "title": title, "body": body });
        Ok(CallToolResult::success(vec![Content::text(response.to_string())]))
    }

    #[tool(description = "Add a comment to an issue in a GitHub repository")]
    async fn add_issue_comment(
        &self,
        #[tool(aggr)] AddIssueCommentRequest { owner, repo, issue_number, body }: AddIssueCommentRequest,
    ) -> Result<CallToolResult, McpError> {
        let url = self
            .github
            .add_issue_comment(&owner, &repo, issue_number, &body)
            .await
            .map_err(|e| github_error("add_issue_comment", e))?;

        let response = json!({ "html_url": url });
        Ok(CallToolResult::success(vec![Content::text(response.to_string())]))
    }
}

#[tool(tool_box)]
impl ServerHandler for RepositoryTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some("This server provides tools to read and write GitHub repository content. Use 'get_file_contents' to read a file and its sha, 'create_or_update_file' to commit a file, 'create_branch' and 'create_pull_request' to propose changes, and 'get_issue' / 'add_issue_comment' to work with issues.".to_string()),
        }
    }
}
