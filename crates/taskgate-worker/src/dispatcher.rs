use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use taskgate_common::clock::now_unix_nanos;
use taskgate_common::ids::{envelope_id, rand_hex};
use taskgate_common::{make_padding, ContinuationToken, DispatchReceipt, WorkEnvelope, WorkParams};
use taskgate_engine::{QueueTransit, TaskStep};

use crate::util::queue_name_from_url;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("missing continuation token in request")]
    MissingContinuation,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("encode envelope: {0}")]
    Encode(String),
    #[error("send message: {0}")]
    Send(String),
}

/// The step an execution blocks on: wraps the continuation token in an envelope and
/// enqueues it. Exactly one send per invocation.
pub struct Dispatcher {
    queue: Arc<dyn QueueTransit>,
    region: String,
}

impl Dispatcher {
    pub fn new(queue: Arc<dyn QueueTransit>, region: impl Into<String>) -> Self {
        Self {
            queue,
            region: region.into(),
        }
    }

    pub async fn dispatch(
        &self,
        token: ContinuationToken,
        params: WorkParams,
    ) -> Result<DispatchReceipt, DispatchError> {
        if token.is_blank() {
            return Err(DispatchError::MissingContinuation);
        }
        let params = params.normalized(|| rand_hex(12));
        let queue_name = queue_name_from_url(self.queue.queue_url());

        let id = envelope_id();
        let send_unix_nano = now_unix_nanos();
        let send_start_unix_nano = now_unix_nanos();

        let envelope = WorkEnvelope {
            id: id.clone(),
            send_unix_nano,
            send_start_unix_nano,
            run_id: params.run_id.clone(),
            continuation_token: token,
            padding: make_padding(params.payload_bytes),
        };
        let body =
            serde_json::to_string(&envelope).map_err(|e| DispatchError::Encode(e.to_string()))?;

        let sent = self
            .queue
            .send(body, Duration::from_secs(params.delay_seconds as u64))
            .await;
        let send_end_unix_nano = now_unix_nanos();
        let sent = sent.map_err(|e| DispatchError::Send(e.to_string()))?;

        info!(
            id=%id,
            queue=%queue_name,
            message_id=%sent.message_id,
            send_unix_nano,
            send_start_unix_nano,
            send_end_unix_nano,
            "sent request"
        );

        Ok(DispatchReceipt {
            queue_name,
            region: self.region.clone(),
            run_id: params.run_id,
            id,
            send_unix_nano,
            send_start_unix_nano,
            send_end_unix_nano,
        })
    }
}

#[async_trait]
impl TaskStep for Dispatcher {
    async fn invoke(&self, token: ContinuationToken, input: Value) -> anyhow::Result<Value> {
        let params: WorkParams = if input.is_null() {
            WorkParams::default()
        } else {
            serde_json::from_value(input).map_err(|e| DispatchError::InvalidInput(e.to_string()))?
        };
        let receipt = self.dispatch(token, params).await?;
        Ok(serde_json::to_value(receipt)?)
    }
}
