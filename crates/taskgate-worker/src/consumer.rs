use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use taskgate_common::clock::now_unix_nanos;
use taskgate_common::{TimestampSet, WorkEnvelope};
use taskgate_engine::{Continuation, Delivery, ExecutionEngine, TaskResult};
use taskgate_meta::{StatusStore, UpdateOutcome, STATUS_PROCESSING};

use crate::util::queue_name_from_source;

pub const ERROR_WORKER: &str = "Worker.Error";

/// Fatal for the delivery: the delivery layer decides whether to redeliver.
#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    #[error("unmarshal message body: {0}")]
    InvalidBody(String),
    #[error("missing id in message body")]
    MissingId,
    #[error("missing continuation token in message body")]
    MissingContinuation,
    #[error("encode result payload: {0}")]
    Encode(String),
    #[error("resume continuation for {id}: {message}")]
    Resume { id: String, message: String },
}

/// The unit of work performed for each envelope.
#[async_trait]
pub trait WorkHandler: Send + Sync {
    /// `Err(cause)` fails the execution instead of completing it.
    async fn perform(&self, envelope: &WorkEnvelope) -> Result<(), String>;
}

/// Does nothing; the pipeline then measures pure coordination overhead.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWork;

#[async_trait]
impl WorkHandler for NoopWork {
    async fn perform(&self, _envelope: &WorkEnvelope) -> Result<(), String> {
        Ok(())
    }
}

/// Consumes envelopes and resumes the executions blocked on them.
pub struct Consumer {
    engine: Arc<dyn ExecutionEngine>,
    store: Arc<dyn StatusStore>,
    work: Arc<dyn WorkHandler>,
}

impl Consumer {
    pub fn new(engine: Arc<dyn ExecutionEngine>, store: Arc<dyn StatusStore>) -> Self {
        Self::with_work(engine, store, Arc::new(NoopWork))
    }

    pub fn with_work(
        engine: Arc<dyn ExecutionEngine>,
        store: Arc<dyn StatusStore>,
        work: Arc<dyn WorkHandler>,
    ) -> Self {
        Self {
            engine,
            store,
            work,
        }
    }

    /// Handle one delivery and return the timestamps passed to the continuation.
    pub async fn handle(&self, delivery: &Delivery) -> Result<TimestampSet, ConsumeError> {
        let queue_name = queue_name_from_source(&delivery.source_queue);

        let envelope: WorkEnvelope = serde_json::from_str(&delivery.body)
            .map_err(|e| ConsumeError::InvalidBody(e.to_string()))?;
        if envelope.id.trim().is_empty() {
            return Err(ConsumeError::MissingId);
        }
        if envelope.continuation_token.is_blank() {
            return Err(ConsumeError::MissingContinuation);
        }

        let receive_unix_nano = now_unix_nanos();

        self.record_processing(&envelope.id, receive_unix_nano).await;

        let work_result = self.work.perform(&envelope).await;

        let worker_done_unix_nano = now_unix_nanos();
        let callback_request_unix_nano = now_unix_nanos();
        let timestamps = TimestampSet {
            id: envelope.id.clone(),
            run_id: envelope.run_id.clone(),
            queue_name,
            send_unix_nano: envelope.send_unix_nano,
            send_start_unix_nano: envelope.send_start_unix_nano,
            receive_unix_nano,
            worker_done_unix_nano,
            callback_request_unix_nano,
            queue_sent_timestamp_ms: delivery.sent_timestamp_ms(),
            queue_first_receive_timestamp_ms: delivery.first_receive_timestamp_ms(),
            queue_approx_receive_count: delivery.approx_receive_count(),
        };

        let result = match work_result {
            Ok(()) => TaskResult::Success(Self::encode(&timestamps)?),
            Err(cause) => {
                warn!(id=%envelope.id, cause=%cause, "work failed, failing execution");
                TaskResult::Failure {
                    error: ERROR_WORKER.to_string(),
                    cause,
                }
            }
        };

        Continuation::new(self.engine.clone(), envelope.continuation_token)
            .resume(result)
            .await
            .map_err(|e| ConsumeError::Resume {
                id: envelope.id.clone(),
                message: e.to_string(),
            })?;

        info!(id=%timestamps.id, queue=%timestamps.queue_name, "sent task result");
        Ok(timestamps)
    }

    /// Best effort: the outcome is logged and otherwise ignored.
    async fn record_processing(&self, id: &str, receive_unix_nano: i64) {
        match self
            .store
            .update_if_absent_or_pending(id, STATUS_PROCESSING, receive_unix_nano)
            .await
        {
            UpdateOutcome::Applied => debug!(id=%id, "status set to processing"),
            UpdateOutcome::ConditionFailed => {
                warn!(id=%id, "conditional status update skipped: record is not absent or pending")
            }
            UpdateOutcome::Failed(e) => warn!(id=%id, error=%e, "conditional status update failed"),
        }
    }

    fn encode(timestamps: &TimestampSet) -> Result<Value, ConsumeError> {
        serde_json::to_value(timestamps).map_err(|e| ConsumeError::Encode(e.to_string()))
    }
}
