use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::execution::ExecutionStatus;

/// Request accepted by the synchronous boundary. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    #[serde(default)]
    pub delay_seconds: i64,

    #[serde(default, rename = "messageBodyBytes")]
    pub payload_bytes: i64,

    /// Caller-side wait budget. Values above the platform ceiling are clamped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Succeeded,
    Failed,
    Aborted,
    TimedOut,
    /// The caller-side wait budget ran out.
    Timeout,
    Error,
}

impl RunStatus {
    /// Maps a terminal execution status. `RUNNING` has no boundary status.
    pub fn from_terminal(status: ExecutionStatus) -> Option<Self> {
        match status {
            ExecutionStatus::Running => None,
            ExecutionStatus::Succeeded => Some(RunStatus::Succeeded),
            ExecutionStatus::Failed => Some(RunStatus::Failed),
            ExecutionStatus::Aborted => Some(RunStatus::Aborted),
            ExecutionStatus::TimedOut => Some(RunStatus::TimedOut),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::Failed => "FAILED",
            RunStatus::Aborted => "ABORTED",
            RunStatus::TimedOut => "TIMED_OUT",
            RunStatus::Timeout => "TIMEOUT",
            RunStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of the synchronous boundary. Always carries elapsed time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,

    pub status: RunStatus,

    #[serde(default)]
    pub total_ms: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResponse {
    pub fn error(status: RunStatus, message: impl Into<String>) -> Self {
        Self {
            execution_id: None,
            status,
            total_ms: 0,
            output: None,
            error: Some(message.into()),
        }
    }
}
