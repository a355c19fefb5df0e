use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use taskgate_engine::{ExecutionEngine, MemoryEngine, MemoryQueue};
use taskgate_meta::StatusStore;

use crate::consumer::{Consumer, NoopWork, WorkHandler};
use crate::dispatcher::Dispatcher;
use crate::worker_loop::worker_loop;

pub const DEFAULT_MAX_RECEIVE_COUNT: i64 = 3;

#[derive(Clone)]
pub struct PipelineConfig {
    pub queue_name: String,
    pub region: String,
    /// How long an execution may stay blocked on its continuation.
    pub task_timeout: Duration,
    pub max_receive_count: i64,
    pub work: Arc<dyn WorkHandler>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_name: "taskgate-requests".to_string(),
            region: "local".to_string(),
            task_timeout: MemoryEngine::DEFAULT_TASK_TIMEOUT,
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT,
            work: Arc::new(NoopWork),
        }
    }
}

/// In-process wiring of engine, dispatcher, queue and worker.
pub struct Pipeline {
    engine: MemoryEngine,
    queue: MemoryQueue,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl Pipeline {
    /// Build the pipeline and start its worker loop. Must be called inside a tokio runtime.
    pub fn in_memory(config: PipelineConfig, store: Arc<dyn StatusStore>) -> Self {
        let queue = MemoryQueue::new(&config.queue_name);
        let dispatcher = Dispatcher::new(Arc::new(queue.clone()), config.region.clone());
        let engine = MemoryEngine::with_task_timeout(Arc::new(dispatcher), config.task_timeout);

        let consumer = Arc::new(Consumer::with_work(
            Arc::new(engine.clone()),
            store,
            config.work.clone(),
        ));
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(worker_loop(
            Arc::new(queue.clone()),
            consumer,
            config.max_receive_count,
            cancel.clone(),
        ));

        info!(queue=%config.queue_name, region=%config.region, "pipeline started");
        Self {
            engine,
            queue,
            cancel,
            worker,
        }
    }

    pub fn engine(&self) -> Arc<dyn ExecutionEngine> {
        Arc::new(self.engine.clone())
    }

    pub fn memory_engine(&self) -> &MemoryEngine {
        &self.engine
    }

    pub fn queue_name(&self) -> &str {
        self.queue.name()
    }

    pub async fn shutdown(self) {
        self.queue.close();
        self.cancel.cancel();
        if let Err(e) = self.worker.await {
            tracing::warn!(error=%e, "worker loop ended abnormally");
        }
        info!("pipeline stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskgate_common::{ExecutionStatus, TimestampSet};
    use taskgate_meta::{MemoryStatusStore, STATUS_PROCESSING};

    async fn wait_terminal(engine: &Arc<dyn ExecutionEngine>, id: &str) -> taskgate_common::ExecutionRecord {
        for _ in 0..200 {
            let rec = engine.describe(id).await.unwrap();
            if rec.status.is_terminal() {
                return rec;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("execution {id} never finished");
    }

    #[tokio::test]
    async fn test_round_trip_succeeds_with_timestamps() {
        let store = Arc::new(MemoryStatusStore::new());
        let pipeline = Pipeline::in_memory(PipelineConfig::default(), store.clone());
        let engine = pipeline.engine();

        let id = engine
            .start(json!({"runId": "run-1", "delaySeconds": 0, "messageBodyBytes": 16}))
            .await
            .unwrap();
        let rec = wait_terminal(&engine, &id).await;
        assert_eq!(rec.status, ExecutionStatus::Succeeded);

        let ts: TimestampSet = serde_json::from_value(rec.output.unwrap()).unwrap();
        assert_eq!(ts.run_id, "run-1");
        assert_eq!(ts.queue_name, "taskgate-requests");
        assert_eq!(ts.queue_approx_receive_count, 1);
        assert!(ts.receive_unix_nano >= ts.send_start_unix_nano);

        assert_eq!(store.get(&ts.id).await.unwrap().status, STATUS_PROCESSING);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_payload_hint_is_capped() {
        let pipeline = Pipeline::in_memory(
            PipelineConfig {
                task_timeout: Duration::from_millis(300),
                ..Default::default()
            },
            Arc::new(MemoryStatusStore::new()),
        );
        let engine = pipeline.engine();
        let id = engine
            .start(json!({"runId": "r", "messageBodyBytes": i64::MAX}))
            .await
            .unwrap();
        let rec = wait_terminal(&engine, &id).await;
        assert_eq!(rec.status, ExecutionStatus::Succeeded);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_input_fails_execution() {
        let pipeline = Pipeline::in_memory(
            PipelineConfig::default(),
            Arc::new(MemoryStatusStore::new()),
        );
        let engine = pipeline.engine();
        let id = engine.start(json!({"delaySeconds": "soon"})).await.unwrap();
        let rec = wait_terminal(&engine, &id).await;
        assert_eq!(rec.status, ExecutionStatus::Failed);
        assert!(rec.failure_message().contains("invalid input"));
        pipeline.shutdown().await;
    }
}
