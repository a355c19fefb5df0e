use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_PROCESSING: &str = "processing";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub receive_unix_nano: i64,
}

impl StatusRecord {
    /// The conditional update only applies to absent or pending records.
    pub fn accepts_update(&self) -> bool {
        self.status.is_empty() || self.status == STATUS_PENDING
    }
}

/// Result of a best-effort update. This is a value, not an error: callers log it and move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// Another delivery got there first, or the record is past `pending`.
    ConditionFailed,
    Failed(String),
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied)
    }
}

/// Telemetry sink keyed by envelope id.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Set `status = new_status` and record the receive instant, but only if the record
    /// is absent or still pending (compare-and-set).
    async fn update_if_absent_or_pending(
        &self,
        id: &str,
        new_status: &str,
        receive_unix_nano: i64,
    ) -> UpdateOutcome;
}
