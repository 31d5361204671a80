use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::agent::Orchestrator;
use crate::applier::{AppliedChanges, Baseline, PullRequestRef, ResultApplier};
use crate::channel::{ADD_ISSUE_COMMENT, ToolChannel, internal_call};
use crate::config::AgentConfig;
use crate::document::DocumentationOutput;
use crate::error::RunError;
use crate::llm::LanguageModel;
use crate::request::DocumentationRequest;
use crate::trigger::{IssueEvent, TriggerListener};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Applied,
    Skipped,
    Failed,
}

/// The outcome of one inbound event, reported back to whoever triggered it.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub source_event_id: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<PullRequestRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    fn applied(source_event_id: String, iterations: usize, changes: AppliedChanges) -> Self {
        Self {
            source_event_id,
            status: RunStatus::Applied,
            iterations: Some(iterations),
            files: changes.files,
            branch: Some(changes.branch),
            pull_request: changes.pull_request,
            error_kind: None,
            error: None,
        }
    }

    fn from_error(source_event_id: String, err: &RunError) -> Self {
        let status = match err {
            RunError::NotApplicable(_) => RunStatus::Skipped,
            _ => RunStatus::Failed,
        };
        Self {
            source_event_id,
            status,
            iterations: None,
            files: Vec::new(),
            branch: None,
            pull_request: None,
            error_kind: Some(err.kind()),
            error: Some(err.to_string()),
        }
    }

    /// Markdown comment describing the outcome.
    fn to_comment(&self) -> String {
        match self.status {
            RunStatus::Applied => {
                let mut body = String::from("Documentation agent finished.\n\n");
                match &self.pull_request {
                    Some(pr) => body.push_str(&format!("Opened pull request #{}.\n", pr.number)),
                    None if self.files.is_empty() => body.push_str("No files needed changes.\n"),
                    None => body.push_str(&format!(
                        "Committed to `{}`.\n",
                        self.branch.as_deref().unwrap_or_default()
                    )),
                }
                for file in &self.files {
                    body.push_str(&format!("- `{file}`\n"));
                }
                body
            }
            RunStatus::Skipped | RunStatus::Failed => format!(
                "Documentation agent stopped: {}",
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Handles inbound events end to end: listen, snapshot, orchestrate, apply, report.
pub struct Pipeline {
    config: AgentConfig,
    listener: TriggerListener,
    model: Arc<dyn LanguageModel>,
    channel: Arc<dyn ToolChannel>,
}

impl Pipeline {
    pub fn new(
        config: AgentConfig,
        model: Arc<dyn LanguageModel>,
        channel: Arc<dyn ToolChannel>,
    ) -> Self {
        Self {
            listener: TriggerListener::new(config.marker.clone()),
            config,
            model,
            channel,
        }
    }

    /// Handle one event. Never fails: every outcome ends up in the report.
    pub async fn handle(&self, event: &IssueEvent) -> RunReport {
        let request = match self.listener.listen(event) {
            Ok(request) => request,
            Err(err) => {
                tracing::info!("Skipping issue #{}: {}", event.issue.number, err);
                let id = format!(
                    "{}/{}#{}",
                    event.repository.owner.login, event.repository.name, event.issue.number
                );
                return RunReport::from_error(id, &err);
            }
        };

        let timeout = self.config.request_timeout;
        let result = match tokio::time::timeout(timeout, self.run(&request)).await {
            Ok(result) => result,
            Err(_) => Err(RunError::Timeout {
                seconds: timeout.as_secs(),
            }),
        };

        let report = match result {
            Ok((iterations, changes)) => {
                RunReport::applied(request.source_event_id.clone(), iterations, changes)
            }
            Err(err) => {
                tracing::error!("{} failed: {}", request.source_event_id, err);
                RunReport::from_error(request.source_event_id.clone(), &err)
            }
        };

        if self.config.comment_on_issue {
            self.post_comment(&request, &report).await;
        }
        report
    }

    /// Handle independent events concurrently, at most `max_concurrent_requests` at a time.
    pub async fn handle_all(self: &Arc<Self>, events: Vec<IssueEvent>) -> Vec<RunReport> {
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_requests.max(1)));
        let mut tasks = JoinSet::new();

        for event in events {
            let pipeline = Arc::clone(self);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                pipeline.handle(&event).await
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!("Request task failed: {}", e),
            }
        }
        reports
    }

    async fn run(&self, request: &DocumentationRequest) -> Result<(usize, AppliedChanges), RunError> {
        let applier = ResultApplier::new(
            Arc::clone(&self.channel),
            self.config.apply_mode,
            self.config.base_branch.clone(),
        );

        let advertised = self.channel.list_tools().await?;
        for required in applier.required_tools() {
            if !advertised.iter().any(|t| t.name == *required) {
                return Err(RunError::UnsupportedTool(required.to_string()));
            }
        }

        let mut baseline =
            Baseline::snapshot(self.channel.as_ref(), request, &self.config.base_branch).await?;

        let orchestrator = Orchestrator::new(
            Arc::clone(&self.model),
            Arc::clone(&self.channel),
            self.config.max_iterations,
            self.config.base_branch.clone(),
        );
        let outcome = orchestrator.run(request, &mut baseline).await?;

        let output = DocumentationOutput::parse(&outcome.answer);
        tracing::info!(
            "{} proposed {} files",
            request.source_event_id,
            output.files.len()
        );

        let changes = applier.apply(request, &output, &baseline).await?;
        Ok((outcome.iterations, changes))
    }

    /// Best-effort status comment on the originating issue.
    async fn post_comment(&self, request: &DocumentationRequest, report: &RunReport) {
        let advertised = match self.channel.list_tools().await {
            Ok(tools) => tools.iter().any(|t| t.name == ADD_ISSUE_COMMENT),
            Err(e) => {
                tracing::warn!("Could not list tools for issue comment: {}", e);
                return;
            }
        };
        if !advertised {
            return;
        }

        let args = json!({
            "owner": request.repository.owner,
            "repo": request.repository.name,
            "issue_number": request.issue_number,
            "body": report.to_comment(),
        });
        match self.channel.call(&internal_call(ADD_ISSUE_COMMENT, args)).await {
            Ok(result) if result.success => {}
            Ok(result) => tracing::warn!("Issue comment failed: {}", result.payload),
            Err(e) => tracing::warn!("Issue comment failed: {}", e),
        }
    }
}
