use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use docs_agent_rs::channel::{McpChannel, ToolChannel};
use docs_agent_rs::config::{AgentConfig, ApplyMode, ConnectionConfig};
use docs_agent_rs::github::GitHubConnector;
use docs_agent_rs::llm::{AnthropicClient, LanguageModel};
use docs_agent_rs::pipeline::{Pipeline, RunStatus};
use docs_agent_rs::server::RepositoryTools;
use docs_agent_rs::trigger::IssueEvent;
use rmcp::{ServiceExt, transport::stdio};
use walkdir::WalkDir;

#[cfg(feature = "trace")]
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "docs-agent", version, about = "Generate repository documentation from GitHub issues")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Handle one or more issue events
    Run(RunArgs),
    /// Serve GitHub repository tools over MCP on stdio
    Serve(ServeArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Issue webhook payload files
    #[clap(long = "event", env = "GITHUB_EVENT_PATH", value_delimiter = ',')]
    events: Vec<PathBuf>,
    /// A directory of issue webhook payloads (*.json), scanned recursively
    #[clap(long)]
    event_dir: Option<PathBuf>,
    /// Issue titles must contain this marker to trigger a run
    #[clap(long, default_value = "[Docs Agent]")]
    marker: String,
    /// Anthropic API key
    #[clap(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_api_key: String,
    /// Anthropic API base URL (optional)
    #[clap(long, env = "ANTHROPIC_BASE_URL")]
    anthropic_base_url: Option<String>,
    /// Model id or alias (sonnet, haiku, opus)
    #[clap(long, default_value = "sonnet")]
    model: String,
    #[clap(long, default_value_t = 8192)]
    max_tokens: u32,
    /// URL of the MCP tool server's SSE endpoint
    #[clap(long, env = "MCP_SERVER_URL")]
    mcp_server_url: String,
    /// Bearer token for the MCP tool server (optional)
    #[clap(long, env = "MCP_ACCESS_TOKEN", hide_env_values = true)]
    mcp_access_token: Option<String>,
    /// Maximum model calls per request
    #[clap(long, default_value_t = 25)]
    max_iterations: usize,
    /// Seconds to wait for a single tool call
    #[clap(long, default_value_t = 60)]
    tool_timeout_secs: u64,
    /// Wall-clock limit for a whole request, in seconds
    #[clap(long, default_value_t = 900)]
    request_timeout_secs: u64,
    /// Requests handled at the same time
    #[clap(long, default_value_t = 4)]
    max_concurrent_requests: usize,
    #[clap(long, value_enum, default_value_t = ApplyMode::PullRequest)]
    apply_mode: ApplyMode,
    /// Branch documentation is based on and merged into
    #[clap(long, default_value = "main")]
    base_branch: String,
    /// Post the outcome as a comment on the issue
    #[clap(long)]
    comment_on_issue: bool,
}

#[derive(Args)]
struct ServeArgs {
    /// A github personal access token to use for authentication (optional)
    #[clap(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_pat: Option<String>,
    /// Concurrent GitHub API requests
    #[clap(long, default_value_t = 5)]
    max_concurrent_requests: usize,
}

/// You can inspect the tool server using the Model Context Protocol Inspector.
/// npx @modelcontextprotocol/inspector cargo run -- serve
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Serve(args) => serve(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    #[cfg(feature = "trace")]
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let events = load_events(&args.events, args.event_dir.as_deref())?;
    if events.is_empty() {
        anyhow::bail!("No issue events given; use --event or --event-dir");
    }
    tracing::info!("Loaded {} issue events", events.len());

    let config = AgentConfig {
        marker: args.marker,
        max_iterations: args.max_iterations,
        tool_timeout: Duration::from_secs(args.tool_timeout_secs),
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        max_concurrent_requests: args.max_concurrent_requests,
        apply_mode: args.apply_mode,
        base_branch: args.base_branch,
        comment_on_issue: args.comment_on_issue,
    };
    let connection = ConnectionConfig {
        anthropic_api_key: args.anthropic_api_key,
        anthropic_base_url: args.anthropic_base_url,
        model: args.model,
        max_tokens: args.max_tokens,
        mcp_server_url: args.mcp_server_url,
        mcp_access_token: args.mcp_access_token,
    };
    tracing::debug!("{:?} {:?}", config, connection);

    let client = match &connection.anthropic_base_url {
        Some(base_url) => AnthropicClient::with_base_url(
            connection.anthropic_api_key.clone(),
            &connection.model,
            connection.max_tokens,
            base_url.clone(),
        ),
        None => AnthropicClient::new(
            connection.anthropic_api_key.clone(),
            &connection.model,
            connection.max_tokens,
        ),
    };
    tracing::info!("Using model {}", client.model());
    let model: Arc<dyn LanguageModel> = Arc::new(client);
    let channel = Arc::new(
        McpChannel::connect(
            &connection.mcp_server_url,
            connection.mcp_access_token.as_deref(),
            config.tool_timeout,
        )
        .await?,
    );

    let pipeline = Arc::new(Pipeline::new(
        config,
        model,
        Arc::clone(&channel) as Arc<dyn ToolChannel>,
    ));
    let reports = pipeline.handle_all(events).await;
    drop(pipeline);

    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
    }

    if let Ok(channel) = Arc::try_unwrap(channel) {
        channel.close().await?;
    }

    let failed = reports
        .iter()
        .filter(|r| r.status == RunStatus::Failed)
        .count();
    if failed > 0 {
        anyhow::bail!("{} of {} requests failed", failed, reports.len());
    }
    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    // stdout carries the protocol, so logs go to a file
    #[cfg(feature = "trace")]
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_writer(std::fs::File::create("docs-agent.log")?)
        .with_ansi(false)
        .init();

    tracing::info!("Starting MCP server");

    let github = GitHubConnector::new(args.github_pat.as_deref(), args.max_concurrent_requests)?;

    let service = RepositoryTools::new(github.clone())
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })?;

    service.waiting().await?;
    tracing::info!("Served {} GitHub API requests", github.request_count());
    Ok(())
}

/// Read every event payload named on the command line or found under `dir`.
fn load_events(paths: &[PathBuf], dir: Option<&std::path::Path>) -> Result<Vec<IssueEvent>> {
    let mut files: Vec<PathBuf> = paths.to_vec();
    if let Some(dir) = dir {
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path.to_path_buf());
            }
        }
    }

    let mut events = Vec::with_capacity(files.len());
    for file in files {
        let payload = std::fs::read_to_string(&file)?;
        match IssueEvent::from_json(&payload) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!("Skipping {}: not an issue event ({})", file.display(), e),
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
        "action": "opened",
        "issue": { "number": 5, "title": "[Docs Agent] Update README", "body": null },
        "repository": { "name": "widgets", "owner": { "login": "octo" } }
    }"#;

    #[test]
    fn test_load_events_from_dir_skips_other_payloads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/issue.json"), EVENT).unwrap();
        std::fs::write(dir.path().join("push.json"), r#"{"ref": "refs/heads/main"}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let events = load_events(&[], Some(dir.path())).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].issue.number, 5);
    }

    #[test]
    fn test_missing_event_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_events(&[dir.path().join("absent.json")], None).is_err());
    }
}
