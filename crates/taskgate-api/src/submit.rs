use std::sync::Arc;

use tokio::time::Instant;
use tracing::info;

use taskgate_common::clock::now_unix_nanos;
use taskgate_common::{CallContext, CoordError, RunRequest, WorkParams};
use taskgate_engine::ExecutionEngine;

/// Work parameters for one run: hints clamped, a blank run id replaced by `run-<nanos>`.
pub fn params_from_request(req: &RunRequest) -> WorkParams {
    WorkParams {
        run_id: req.run_id.clone().unwrap_or_default(),
        delay_seconds: req.delay_seconds,
        payload_bytes: req.payload_bytes,
    }
    .normalized(|| format!("run-{}", now_unix_nanos()))
}

/// Starts executions. The engine's task step performs the single enqueue.
#[derive(Clone)]
pub struct Submitter {
    engine: Arc<dyn ExecutionEngine>,
}

impl Submitter {
    pub fn new(engine: Arc<dyn ExecutionEngine>) -> Self {
        Self { engine }
    }

    /// Start one execution, bounded by the context deadline.
    pub async fn submit(
        &self,
        ctx: &CallContext,
        params: &WorkParams,
        start: Instant,
    ) -> Result<String, CoordError> {
        let input = serde_json::to_value(params)
            .map_err(|e| CoordError::Validation(format!("encode execution input: {e}")))?;

        let elapsed = || start.elapsed().as_millis() as i64;
        let started = match ctx.deadline() {
            Some(deadline) => tokio::select! {
                _ = ctx.cancellation().cancelled() => {
                    return Err(CoordError::Timeout {
                        execution_id: None,
                        elapsed_ms: elapsed(),
                        reason: "context canceled".to_string(),
                    })
                }
                r = tokio::time::timeout_at(deadline, self.engine.start(input)) => r.map_err(|_| {
                    CoordError::Timeout {
                        execution_id: None,
                        elapsed_ms: elapsed(),
                        reason: "context deadline exceeded".to_string(),
                    }
                })?,
            },
            None => self.engine.start(input).await,
        };

        let execution_id = started.map_err(|e| CoordError::Transport {
            op: "start execution",
            execution_id: None,
            elapsed_ms: elapsed(),
            message: e.to_string(),
        })?;
        if execution_id.trim().is_empty() {
            return Err(CoordError::Transport {
                op: "start execution",
                execution_id: None,
                elapsed_ms: elapsed(),
                message: "missing execution id".to_string(),
            });
        }

        info!(execution_id=%execution_id, run_id=%params.run_id, "execution started");
        Ok(execution_id)
    }
}
