use serde::Deserialize;

use crate::error::RunError;
use crate::request::{DocumentationRequest, RepositoryRef};

/// Actions on an issue that start a documentation run. A payload without an
/// action (hand-written or forwarded by CI) is treated as `opened`.
const TRIGGER_ACTIONS: [&str; 3] = ["opened", "edited", "reopened"];

/// The parts of a GitHub `issues` webhook payload the listener reads.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueEvent {
    #[serde(default)]
    pub action: Option<String>,
    /// Webhook delivery id, when the sender forwards it
    #[serde(default)]
    pub delivery_id: Option<String>,
    pub issue: Issue,
    pub repository: Repository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: Owner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    pub login: String,
}

impl IssueEvent {
    pub fn from_json(payload: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Turns issue notifications into documentation requests.
#[derive(Debug, Clone)]
pub struct TriggerListener {
    marker: String,
}

impl TriggerListener {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Accept a notification, or report `NotApplicable` when it is not ours.
    pub fn listen(&self, event: &IssueEvent) -> Result<DocumentationRequest, RunError> {
        if let Some(action) = event.action.as_deref() {
            if !TRIGGER_ACTIONS.contains(&action) {
                return Err(RunError::NotApplicable(format!(
                    "issue action '{action}' does not trigger documentation"
                )));
            }
        }

        if !event.issue.title.contains(&self.marker) {
            return Err(RunError::NotApplicable(format!(
                "issue title does not contain '{}'",
                self.marker
            )));
        }

        let repository = RepositoryRef {
            owner: event.repository.owner.login.clone(),
            name: event.repository.name.clone(),
        };
        let source_event_id = event
            .delivery_id
            .clone()
            .unwrap_or_else(|| format!("{}#{}", repository.slug(), event.issue.number));

        tracing::info!("Issue {} matched marker '{}'", source_event_id, self.marker);

        Ok(DocumentationRequest::parse(
            source_event_id,
            repository,
            event.issue.number,
            &self.marker,
            &event.issue.title,
            event.issue.body.as_deref().unwrap_or(""),
        ))
    }
}
