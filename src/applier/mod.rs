use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};

use crate::channel::{
    CREATE_BRANCH, CREATE_OR_UPDATE_FILE, CREATE_PULL_REQUEST, GET_FILE_CONTENTS, ToolChannel,
    file_sha, internal_call, is_existing_pull_request, is_missing_file,
};
use crate::config::ApplyMode;
use crate::document::DocumentationOutput;
use crate::error::RunError;
use crate::request::DocumentationRequest;

/// File versions seen since the request began, keyed by path.
/// `None` records that the file did not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    shas: HashMap<String, Option<String>>,
}

impl Baseline {
    /// Record a version. The first observation of a path wins.
    pub fn observe(&mut self, path: &str, sha: Option<String>) {
        self.shas.entry(path.to_string()).or_insert(sha);
    }

    /// The recorded version, or `None` if the path was never observed.
    pub fn get(&self, path: &str) -> Option<&Option<String>> {
        self.shas.get(path)
    }

    pub fn len(&self) -> usize {
        self.shas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shas.is_empty()
    }

    /// Read every explicitly requested path from the base branch.
    pub async fn snapshot(
        channel: &dyn ToolChannel,
        request: &DocumentationRequest,
        base_branch: &str,
    ) -> Result<Self, RunError> {
        let mut baseline = Self::default();
        for path in request.requested_scope.paths() {
            let sha = read_sha(channel, request, path, base_branch).await?;
            tracing::debug!("Baseline {} at {:?}", path, sha);
            baseline.observe(path, sha);
        }
        Ok(baseline)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestRef {
    pub number: u64,
    pub url: Option<String>,
}

/// What was written back to the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedChanges {
    pub branch: String,
    pub files: Vec<String>,
    pub pull_request: Option<PullRequestRef>,
}

/// Writes the orchestrator's output to the repository through the tool channel.
pub struct ResultApplier {
    channel: Arc<dyn ToolChannel>,
    mode: ApplyMode,
    base_branch: String,
}

impl ResultApplier {
    pub fn new(channel: Arc<dyn ToolChannel>, mode: ApplyMode, base_branch: impl Into<String>) -> Self {
        Self {
            channel,
            mode,
            base_branch: base_branch.into(),
        }
    }

    /// Tools the server must advertise for this applier to work.
    pub fn required_tools(&self) -> &'static [&'static str] {
        match self.mode {
            ApplyMode::Direct => &[GET_FILE_CONTENTS, CREATE_OR_UPDATE_FILE],
            ApplyMode::PullRequest => &[
                GET_FILE_CONTENTS,
                CREATE_OR_UPDATE_FILE,
                CREATE_BRANCH,
                CREATE_PULL_REQUEST,
            ],
        }
    }

    /// Apply `output`. Fails with `ApplyConflict` before writing anything if a
    /// target file moved away from its baseline version.
    ///
    /// A rerun for the same issue commits onto the existing issue branch; its
    /// open pull request picks the commits up, so `pull_request` is `None` when
    /// the server reports one already exists and did not return it.
    pub async fn apply(
        &self,
        request: &DocumentationRequest,
        output: &DocumentationOutput,
        baseline: &Baseline,
    ) -> Result<AppliedChanges, RunError> {
        if output.is_empty() {
            tracing::info!("{}: no files proposed, nothing to apply", request.source_event_id);
            return Ok(AppliedChanges {
                branch: self.base_branch.clone(),
                files: Vec::new(),
                pull_request: None,
            });
        }

        let channel = self.channel.as_ref();

        for file in &output.files {
            let current = read_sha(channel, request, &file.path, &self.base_branch).await?;
            if let Some(expected) = baseline.get(&file.path) {
                if *expected != current {
                    tracing::warn!(
                        "{} changed underfoot: {:?} -> {:?}",
                        file.path,
                        expected,
                        current
                    );
                    return Err(RunError::ApplyConflict {
                        path: file.path.clone(),
                    });
                }
            }
        }

        let branch = match self.mode {
            ApplyMode::Direct => self.base_branch.clone(),
            ApplyMode::PullRequest => {
                let branch = format!("docs/issue-{}", request.issue_number);
                self.create_branch(request, &branch).await?;
                branch
            }
        };

        let mut written = Vec::with_capacity(output.files.len());
        for file in &output.files {
            let sha = read_sha(channel, request, &file.path, &branch).await?;
            let mut args = json!({
                "owner": request.repository.owner,
                "repo": request.repository.name,
                "path": file.path,
                "content": file.content,
                "message": format!("docs: {} (#{})", file.title, request.issue_number),
                "branch": branch,
            });
            if let Some(sha) = sha {
                args["sha"] = Value::String(sha);
            }

            let result = channel.call(&internal_call(CREATE_OR_UPDATE_FILE, args)).await?;
            if !result.success {
                return Err(RunError::ApplyFailed {
                    target: file.path.clone(),
                    reason: result.payload,
                });
            }
            tracing::info!("Wrote {} to {}", file.path, branch);
            written.push(file.path.clone());
        }

        let pull_request = match self.mode {
            ApplyMode::Direct => None,
            ApplyMode::PullRequest => self.open_pull_request(request, output, &branch).await?,
        };

        Ok(AppliedChanges {
            branch,
            files: written,
            pull_request,
        })
    }

    async fn create_branch(&self, request: &DocumentationRequest, branch: &str) -> Result<(), RunError> {
        let args = json!({
            "owner": request.repository.owner,
            "repo": request.repository.name,
            "branch": branch,
            "from_branch": self.base_branch,
        });
        let result = self.channel.call(&internal_call(CREATE_BRANCH, args)).await?;
        if !result.success {
            // An edited issue reruns onto the branch its first run created
            tracing::warn!("Could not create branch {}: {}", branch, result.payload);
        }
        Ok(())
    }

    async fn open_pull_request(
        &self,
        request: &DocumentationRequest,
        output: &DocumentationOutput,
        branch: &str,
    ) -> Result<Option<PullRequestRef>, RunError> {
        let title = match output.files.as_slice() {
            [only] => format!("docs: {}", only.title),
            files => format!("docs: update {} documentation files", files.len()),
        };
        let mut body = String::new();
        if let Some(summary) = &output.summary {
            body.push_str(summary);
            body.push_str("\n\n");
        }
        body.push_str("Files:\n");
        for file in &output.files {
            body.push_str(&format!("- `{}`\n", file.path));
        }
        body.push_str(&format!("\nResolves #{}\n", request.issue_number));

        let args = json!({
            "owner": request.repository.owner,
            "repo": request.repository.name,
            "title": format!("{title} (#{})", request.issue_number),
            "head": branch,
            "base": self.base_branch,
            "body": body,
        });
        let result = self
            .channel
            .call(&internal_call(CREATE_PULL_REQUEST, args))
            .await?;
        if is_existing_pull_request(&result) {
            tracing::info!("Pull request from {} is already open", branch);
            return Ok(None);
        }
        if !result.success {
            return Err(RunError::ApplyFailed {
                target: format!("pull request from {branch}"),
                reason: result.payload,
            });
        }

        let payload = result.json().unwrap_or(Value::Null);
        let pr = PullRequestRef {
            number: payload.get("number").and_then(Value::as_u64).unwrap_or_default(),
            url: payload
                .get("html_url")
                .or_else(|| payload.get("url"))
                .and_then(Value::as_str)
                .map(str::to_string),
        };
        tracing::info!("Opened pull request #{} for {}", pr.number, request.source_event_id);
        Ok(Some(pr))
    }
}

/// Current sha of `path` on `branch`, `None` if the file does not exist there.
/// Any other read failure is an error: it must not pass for a missing file.
async fn read_sha(
    channel: &dyn ToolChannel,
    request: &DocumentationRequest,
    path: &str,
    branch: &str,
) -> Result<Option<String>, RunError> {
    let args = json!({
        "owner": request.repository.owner,
        "repo": request.repository.name,
        "path": path,
        "branch": branch,
    });
    let result = channel.call(&internal_call(GET_FILE_CONTENTS, args)).await?;
    if !result.success && !is_missing_file(&result) {
        return Err(RunError::ApplyFailed {
            target: format!("{path} on {branch}"),
            reason: result.payload,
        });
    }
    Ok(file_sha(&result))
}
