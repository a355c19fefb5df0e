use serde::{Deserialize, Serialize};

/// Result payload handed to the continuation: every instant recorded along the way.
///
/// A zero value means the instant was not recorded. Instants come from independently
/// clocked hops and are only causally, not numerically, ordered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimestampSet {
    pub id: String,
    pub run_id: String,
    pub queue_name: String,

    pub send_unix_nano: i64,
    pub send_start_unix_nano: i64,
    pub receive_unix_nano: i64,
    pub worker_done_unix_nano: i64,
    /// When the continuation call was issued; its completion cannot be reported here.
    pub callback_request_unix_nano: i64,

    pub queue_sent_timestamp_ms: i64,
    pub queue_first_receive_timestamp_ms: i64,
    /// Estimate supplied by the queue, not an exact count.
    pub queue_approx_receive_count: i64,
}
