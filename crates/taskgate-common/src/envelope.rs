use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound for the queue delay hint, in seconds.
pub const MAX_DELAY_SECONDS: i64 = 900;

pub fn clamp_delay_seconds(delay_seconds: i64) -> i64 {
    delay_seconds.clamp(0, MAX_DELAY_SECONDS)
}

/// Upper bound for the payload size hint: one queue message body, 256 KiB.
pub const MAX_PAYLOAD_BYTES: i64 = 256 * 1024;

pub fn clamp_payload_bytes(payload_bytes: i64) -> i64 {
    payload_bytes.clamp(0, MAX_PAYLOAD_BYTES)
}

/// Filler used to simulate larger message bodies. Empty for non-positive sizes.
pub fn make_padding(payload_bytes: i64) -> Option<String> {
    let n = clamp_payload_bytes(payload_bytes);
    if n == 0 {
        return None;
    }
    Some("x".repeat(n as usize))
}

/// Opaque capability handed out by the execution engine. Whoever holds it can resume
/// exactly one blocked execution, once.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContinuationToken(<{} bytes>)", self.0.len())
    }
}

/// Caller-supplied work parameters, as carried in the execution input.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkParams {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub run_id: String,

    #[serde(default)]
    pub delay_seconds: i64,

    #[serde(default, rename = "messageBodyBytes")]
    pub payload_bytes: i64,
}

impl WorkParams {
    /// Clamp the hints into range and fill a blank run id from `gen_run_id`.
    pub fn normalized(mut self, gen_run_id: impl FnOnce() -> String) -> Self {
        self.delay_seconds = clamp_delay_seconds(self.delay_seconds);
        self.payload_bytes = clamp_payload_bytes(self.payload_bytes);
        if self.run_id.trim().is_empty() {
            self.run_id = gen_run_id();
        }
        self
    }
}

/// The unit of work moved through the queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkEnvelope {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub send_unix_nano: i64,

    #[serde(default)]
    pub send_start_unix_nano: i64,

    #[serde(default)]
    pub run_id: String,

    #[serde(default)]
    pub continuation_token: ContinuationToken,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<String>,
}

/// What the enqueue step reports back once the envelope has been handed to the queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReceipt {
    pub queue_name: String,
    pub region: String,
    pub run_id: String,
    pub id: String,
    pub send_unix_nano: i64,
    pub send_start_unix_nano: i64,
    pub send_end_unix_nano: i64,
}
