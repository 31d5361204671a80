use crate::llm::ModelError;

/// Terminal outcomes of a documentation request. None of them is retried.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("not applicable: {0}")]
    NotApplicable(String),

    #[error("tool budget exceeded after {limit} iterations")]
    BudgetExceeded { limit: usize },

    #[error("tool channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("apply conflict: {path} changed since the request began")]
    ApplyConflict { path: String },

    #[error("could not apply {target}: {reason}")]
    ApplyFailed { target: String, reason: String },

    #[error("model error: {0}")]
    ModelError(#[from] ModelError),

    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("tool server does not advertise {0}")]
    UnsupportedTool(String),
}

impl RunError {
    /// Short machine-readable name used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::NotApplicable(_) => "not_applicable",
            RunError::BudgetExceeded { .. } => "budget_exceeded",
            RunError::ChannelUnavailable(_) => "channel_unavailable",
            RunError::ApplyConflict { .. } => "apply_conflict",
            RunError::ApplyFailed { .. } => "apply_failed",
            RunError::ModelError(_) => "model_error",
            RunError::Timeout { .. } => "timeout",
            RunError::UnsupportedTool(_) => "unsupported_tool",
        }
    }
}

impl From<crate::channel::ChannelError> for RunError {
    fn from(err: crate::channel::ChannelError) -> Self {
        match err {
            crate::channel::ChannelError::Unavailable(msg) => RunError::ChannelUnavailable(msg),
        }
    }
}
