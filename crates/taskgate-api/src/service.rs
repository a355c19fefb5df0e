use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};

use taskgate_common::{CallContext, CoordError, RunRequest, RunResponse, RunStatus};
use taskgate_engine::ExecutionEngine;

use crate::submit::{params_from_request, Submitter};
use crate::waiter::{effective_timeout, requested_wait, wait_for_completion, WaitOutcome, WaitPolicy};

/// The synchronous boundary: start one execution and block until it finishes.
#[derive(Clone)]
pub struct RunService {
    engine: Arc<dyn ExecutionEngine>,
    submitter: Submitter,
    policy: WaitPolicy,
}

impl RunService {
    pub fn new(engine: Arc<dyn ExecutionEngine>, policy: WaitPolicy) -> Self {
        Self {
            submitter: Submitter::new(engine.clone()),
            engine,
            policy,
        }
    }

    pub fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    /// Run once under `ctx`. The returned error carries elapsed time and execution id.
    pub async fn run(&self, ctx: &CallContext, req: &RunRequest) -> Result<WaitOutcome, CoordError> {
        let params = params_from_request(req);

        let Some(budget) = effective_timeout(
            requested_wait(req.max_wait_ms),
            ctx.remaining(),
            &self.policy,
        ) else {
            return Err(CoordError::Timeout {
                execution_id: None,
                elapsed_ms: 0,
                reason: "deadline too close".to_string(),
            });
        };
        let call_ctx = ctx.child_with_timeout(budget);

        let start = Instant::now();
        let execution_id = self.submitter.submit(&call_ctx, &params, start).await?;
        wait_for_completion(
            self.engine.as_ref(),
            &execution_id,
            &call_ctx,
            start,
            self.policy.poll_interval,
        )
        .await
    }

    /// Like [`run`](Self::run) but always answers with a status and elapsed time.
    pub async fn run_sync(&self, ctx: &CallContext, req: &RunRequest) -> RunResponse {
        into_response(self.run(ctx, req).await)
    }
}

pub fn into_response(result: Result<WaitOutcome, CoordError>) -> RunResponse {
    match result {
        Ok(out) => {
            info!(execution_id=%out.execution_id, total_ms=out.elapsed_ms, "run succeeded");
            RunResponse {
                execution_id: Some(out.execution_id),
                status: RunStatus::Succeeded,
                total_ms: out.elapsed_ms,
                output: out.output,
                error: None,
            }
        }
        Err(e) => {
            warn!(
                execution_id = e.execution_id().unwrap_or(""),
                status = %e.run_status(),
                total_ms = e.elapsed_ms(),
                error = %e,
                "run did not succeed"
            );
            RunResponse {
                execution_id: e.execution_id().map(str::to_string),
                status: e.run_status(),
                total_ms: e.elapsed_ms(),
                output: None,
                error: Some(e.public_message()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::Value;
    use taskgate_common::{ContinuationToken, ExecutionRecord, ExecutionStatus};
    use taskgate_engine::TaskResult;

    /// Never finishes; records the input it was started with.
    #[derive(Default)]
    struct StuckEngine {
        input: tokio::sync::Mutex<Option<Value>>,
        fail_start: bool,
    }

    #[async_trait]
    impl ExecutionEngine for StuckEngine {
        async fn start(&self, input: Value) -> anyhow::Result<String> {
            if self.fail_start {
                return Err(anyhow!("throttled"));
            }
            *self.input.lock().await = Some(input);
            Ok("exec-1".to_string())
        }

        async fn describe(&self, id: &str) -> anyhow::Result<ExecutionRecord> {
            Ok(ExecutionRecord::running(id.to_string(), 0))
        }

        async fn resume(&self, _t: &ContinuationToken, _r: TaskResult) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_above_ceiling_is_clamped() {
        let engine = Arc::new(StuckEngine::default());
        let svc = RunService::new(engine.clone(), WaitPolicy::default());
        let req = RunRequest {
            max_wait_ms: Some(60_000),
            ..Default::default()
        };
        let resp = svc.run_sync(&CallContext::background(), &req).await;
        assert_eq!(resp.status, RunStatus::Timeout);
        assert_eq!(resp.total_ms, 28_000);
        assert_eq!(resp.execution_id.as_deref(), Some("exec-1"));

        let input = engine.input.lock().await.clone().unwrap();
        assert!(input["runId"].as_str().unwrap().starts_with("run-"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ambient_deadline_tightens_budget() {
        let svc = RunService::new(Arc::new(StuckEngine::default()), WaitPolicy::default());
        let ctx = CallContext::with_timeout(Duration::from_millis(1_250));
        let resp = svc.run_sync(&ctx, &RunRequest::default()).await;
        assert_eq!(resp.status, RunStatus::Timeout);
        assert_eq!(resp.total_ms, 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_too_close_skips_start() {
        let engine = Arc::new(StuckEngine::default());
        let svc = RunService::new(engine.clone(), WaitPolicy::default());
        let ctx = CallContext::with_timeout(Duration::from_millis(200));
        let resp = svc.run_sync(&ctx, &RunRequest::default()).await;
        assert_eq!(resp.status, RunStatus::Timeout);
        assert_eq!(resp.error.as_deref(), Some("deadline too close"));
        assert_eq!(resp.total_ms, 0);
        assert!(engine.input.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_start_failure_is_error() {
        let engine = Arc::new(StuckEngine {
            fail_start: true,
            ..Default::default()
        });
        let svc = RunService::new(engine, WaitPolicy::default());
        let resp = svc.run_sync(&CallContext::background(), &RunRequest::default()).await;
        assert_eq!(resp.status, RunStatus::Error);
        assert_eq!(resp.error.as_deref(), Some("start execution: throttled"));
        assert!(resp.execution_id.is_none());
    }

    #[test]
    fn test_terminal_response_carries_cause() {
        let resp = into_response(Err(CoordError::Terminal {
            status: ExecutionStatus::Aborted,
            execution_id: "exec-9".to_string(),
            elapsed_ms: 42,
            cause: "operator stop".to_string(),
        }));
        assert_eq!(resp.status, RunStatus::Aborted);
        assert_eq!(resp.total_ms, 42);
        assert_eq!(resp.error.as_deref(), Some("operator stop"));
    }
}
