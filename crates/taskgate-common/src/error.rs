use crate::execution::ExecutionStatus;
use crate::run::RunStatus;

/// Failures of the coordination core. Each kind that can happen after work has started
/// carries the elapsed time so the latency of the failure path stays observable.
///
/// Best-effort side-channel failures are not represented here: they are reported through
/// `UpdateOutcome` in `taskgate-meta` and never propagate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{op}: {message}")]
    Transport {
        op: &'static str,
        execution_id: Option<String>,
        elapsed_ms: i64,
        message: String,
    },

    #[error("timed out after {elapsed_ms}ms: {reason}")]
    Timeout {
        execution_id: Option<String>,
        elapsed_ms: i64,
        reason: String,
    },

    #[error("execution {status}: {cause}")]
    Terminal {
        status: ExecutionStatus,
        execution_id: String,
        elapsed_ms: i64,
        cause: String,
    },
}

impl CoordError {
    pub fn run_status(&self) -> RunStatus {
        match self {
            CoordError::Validation(_) | CoordError::Transport { .. } => RunStatus::Error,
            CoordError::Timeout { .. } => RunStatus::Timeout,
            CoordError::Terminal { status, .. } => {
                RunStatus::from_terminal(*status).unwrap_or(RunStatus::Error)
            }
        }
    }

    pub fn elapsed_ms(&self) -> i64 {
        match self {
            CoordError::Validation(_) => 0,
            CoordError::Transport { elapsed_ms, .. }
            | CoordError::Timeout { elapsed_ms, .. }
            | CoordError::Terminal { elapsed_ms, .. } => *elapsed_ms,
        }
    }

    pub fn execution_id(&self) -> Option<&str> {
        match self {
            CoordError::Validation(_) => None,
            CoordError::Transport { execution_id, .. } | CoordError::Timeout { execution_id, .. } => {
                execution_id.as_deref()
            }
            CoordError::Terminal { execution_id, .. } => Some(execution_id),
        }
    }

    /// Message surfaced to callers of the synchronous boundary.
    pub fn public_message(&self) -> String {
        match self {
            CoordError::Terminal { cause, .. } => cause.clone(),
            CoordError::Timeout { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}
