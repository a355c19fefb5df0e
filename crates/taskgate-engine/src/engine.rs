use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use taskgate_common::clock::now_unix_ms;
use taskgate_common::{ContinuationToken, ExecutionRecord, ExecutionStatus};

pub const ERROR_TASK_FAILED: &str = "States.TaskFailed";
pub const ERROR_TIMEOUT: &str = "States.Timeout";

/// Result handed to a continuation.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    Success(Value),
    Failure { error: String, cause: String },
}

/// The execution engine the core coordinates with. Only three operations are relied on.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Start an asynchronous execution and return its identifier.
    async fn start(&self, input: Value) -> Result<String>;

    async fn describe(&self, execution_id: &str) -> Result<ExecutionRecord>;

    /// Resume the execution blocked on `token`. A token is good for one call.
    async fn resume(&self, token: &ContinuationToken, result: TaskResult) -> Result<()>;
}

/// The step an execution blocks on. It receives the continuation token for that execution
/// and must arrange for someone to resume it later.
#[async_trait]
pub trait TaskStep: Send + Sync {
    async fn invoke(&self, token: ContinuationToken, input: Value) -> Result<Value>;
}

/// Single-use capability to resume one execution. Consumed by `resume`.
pub struct Continuation {
    engine: Arc<dyn ExecutionEngine>,
    token: ContinuationToken,
}

impl Continuation {
    pub fn new(engine: Arc<dyn ExecutionEngine>, token: ContinuationToken) -> Self {
        Self { engine, token }
    }

    pub async fn resume(self, result: TaskResult) -> Result<()> {
        self.engine.resume(&self.token, result).await
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Continuation")
            .field("token", &self.token)
            .finish()
    }
}

/// In-process engine: every execution runs one `TaskStep` and waits for its token.
///
/// Finished executions stay describable for `retention`, then are evicted on a later
/// `start`.
#[derive(Clone)]
pub struct MemoryEngine {
    inner: Arc<RwLock<Inner>>,
    step: Arc<dyn TaskStep>,
    task_timeout: Duration,
    retention: Duration,
}

#[derive(Debug, Default)]
struct Inner {
    executions: HashMap<String, ExecutionRecord>,
    /// Outstanding tokens. Removed on first use or when the execution stops.
    tokens: HashMap<ContinuationToken, String>,
    /// Cancelled when the execution stops so its supervisor can exit.
    stops: HashMap<String, CancellationToken>,
    /// Finished executions in stop order.
    finished: VecDeque<(Instant, String)>,
}

impl Inner {
    fn finish(
        &mut self,
        execution_id: &str,
        status: ExecutionStatus,
        output: Option<Value>,
        error: Option<String>,
        cause: Option<String>,
    ) -> bool {
        let Some(rec) = self.executions.get_mut(execution_id) else {
            return false;
        };
        if rec.status.is_terminal() {
            return false;
        }
        rec.status = status;
        rec.output = output;
        rec.error = error;
        rec.cause = cause;
        rec.stopped_at_ms = Some(now_unix_ms());
        self.tokens.retain(|_, id| id.as_str() != execution_id);
        if let Some(stop) = self.stops.remove(execution_id) {
            stop.cancel();
        }
        self.finished
            .push_back((Instant::now(), execution_id.to_string()));
        true
    }

    fn evict_finished(&mut self, retention: Duration) {
        let now = Instant::now();
        while let Some((stopped, _)) = self.finished.front() {
            if *stopped + retention > now {
                break;
            }
            if let Some((_, id)) = self.finished.pop_front() {
                self.executions.remove(&id);
            }
        }
    }
}

impl MemoryEngine {
    pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_RETENTION: Duration = Duration::from_secs(300);

    pub fn new(step: Arc<dyn TaskStep>) -> Self {
        Self::with_task_timeout(step, Self::DEFAULT_TASK_TIMEOUT)
    }

    pub fn with_task_timeout(step: Arc<dyn TaskStep>, task_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            step,
            task_timeout,
            retention: Self::DEFAULT_RETENTION,
        }
    }

    /// How long a finished execution stays describable.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Executions currently held, running or finished.
    pub async fn execution_count(&self) -> usize {
        self.inner.read().await.executions.len()
    }

    /// Stop a running execution from outside. No-op for finished executions.
    pub async fn abort(&self, execution_id: &str, cause: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.executions.contains_key(execution_id) {
            return Err(anyhow!("execution does not exist: {execution_id}"));
        }
        inner.finish(
            execution_id,
            ExecutionStatus::Aborted,
            None,
            None,
            Some(cause.to_string()),
        );
        Ok(())
    }
}

/// Runs the step for one execution and arms its timeout. Returns as soon as the
/// execution stops, whoever stopped it.
async fn supervise(
    inner: Arc<RwLock<Inner>>,
    step: Arc<dyn TaskStep>,
    execution_id: String,
    token: ContinuationToken,
    input: Value,
    deadline: Instant,
    stop: CancellationToken,
) {
    let mut step_task = tokio::spawn(async move { step.invoke(token, input).await });

    let joined = tokio::select! {
        _ = stop.cancelled() => return,
        _ = tokio::time::sleep_until(deadline) => {
            step_task.abort();
            None
        }
        joined = &mut step_task => Some(joined),
    };

    let failure = match joined {
        Some(Ok(Ok(_))) => {
            tracing::debug!(execution_id=%execution_id, "task step dispatched, waiting for token");
            None
        }
        Some(Ok(Err(e))) => Some(e.to_string()),
        Some(Err(e)) => Some(format!("task step panicked: {e}")),
        None => None,
    };
    if let Some(cause) = failure {
        tracing::warn!(execution_id=%execution_id, error=%cause, "task step failed");
        inner.write().await.finish(
            &execution_id,
            ExecutionStatus::Failed,
            None,
            Some(ERROR_TASK_FAILED.to_string()),
            Some(cause),
        );
        return;
    }

    tokio::select! {
        _ = stop.cancelled() => return,
        _ = tokio::time::sleep_until(deadline) => {}
    }
    let timed_out = inner.write().await.finish(
        &execution_id,
        ExecutionStatus::TimedOut,
        None,
        Some(ERROR_TIMEOUT.to_string()),
        Some("task did not report completion in time".to_string()),
    );
    if timed_out {
        tracing::warn!(execution_id=%execution_id, "task timed out");
    }
}

#[async_trait]
impl ExecutionEngine for MemoryEngine {
    async fn start(&self, input: Value) -> Result<String> {
        let execution_id = format!("exec-{}", Uuid::new_v4());
        let token = ContinuationToken::new(format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        ));
        let stop = CancellationToken::new();

        {
            let mut inner = self.inner.write().await;
            inner.evict_finished(self.retention);
            inner.executions.insert(
                execution_id.clone(),
                ExecutionRecord::running(execution_id.clone(), now_unix_ms()),
            );
            inner.tokens.insert(token.clone(), execution_id.clone());
            inner.stops.insert(execution_id.clone(), stop.clone());
        }

        tokio::spawn(supervise(
            self.inner.clone(),
            self.step.clone(),
            execution_id.clone(),
            token,
            input,
            Instant::now() + self.task_timeout,
            stop,
        ));

        Ok(execution_id)
    }

    async fn describe(&self, execution_id: &str) -> Result<ExecutionRecord> {
        let inner = self.inner.read().await;
        inner
            .executions
            .get(execution_id)
            .cloned()
            .ok_or_else(|| anyhow!("execution does not exist: {execution_id}"))
    }

    async fn resume(&self, token: &ContinuationToken, result: TaskResult) -> Result<()> {
        let mut inner = self.inner.write().await;
        let execution_id = inner
            .tokens
            .remove(token)
            .ok_or_else(|| anyhow!("task token is invalid or already used"))?;

        let applied = match result {
            TaskResult::Success(output) => inner.finish(
                &execution_id,
                ExecutionStatus::Succeeded,
                Some(output),
                None,
                None,
            ),
            TaskResult::Failure { error, cause } => inner.finish(
                &execution_id,
                ExecutionStatus::Failed,
                None,
                Some(error),
                Some(cause),
            ),
        };
        if !applied {
            return Err(anyhow!("execution {execution_id} is no longer running"));
        }
        Ok(())
    }
}
