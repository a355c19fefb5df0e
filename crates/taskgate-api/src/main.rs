mod args;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use taskgate_api::metrics::Metrics;
use taskgate_api::{app, AppState, RunService, WaitPolicy};
use taskgate_meta::{EtcdStatusStore, MemoryStatusStore, StatusStore};
use taskgate_worker::{Pipeline, PipelineConfig};

use crate::args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let telemetry = taskgate_common::telemetry::init_tracing(
        "taskgate-api",
        args.otlp_endpoint.as_deref(),
        args.otlp_token.as_deref(),
    );

    let store: Arc<dyn StatusStore> = match &args.etcd_endpoint {
        Some(ep) => Arc::new(EtcdStatusStore::connect(std::slice::from_ref(ep)).await?),
        None => {
            tracing::warn!("etcd_endpoint not set, using in-process status store");
            Arc::new(MemoryStatusStore::new())
        }
    };

    let pipeline = Pipeline::in_memory(
        PipelineConfig {
            queue_name: args.queue_name.clone(),
            region: args.region.clone(),
            task_timeout: Duration::from_secs(args.task_timeout_secs),
            max_receive_count: args.max_receive_count,
            ..Default::default()
        },
        store,
    );

    let policy = WaitPolicy {
        default_wait: Duration::from_millis(args.default_wait_ms),
        max_wait: Duration::from_millis(args.max_wait_ms),
        deadline_margin: Duration::from_millis(args.deadline_margin_ms),
        poll_interval: Duration::from_millis(args.poll_interval_ms),
    };

    let st = AppState {
        service: Arc::new(RunService::new(pipeline.engine(), policy)),
        metrics: Arc::new(Metrics::default()),
        request_deadline: (args.request_deadline_ms > 0)
            .then(|| Duration::from_millis(args.request_deadline_ms)),
    };

    let listener = tokio::net::TcpListener::bind(&args.listen_addr).await?;
    tracing::info!(addr=%args.listen_addr, queue=%args.queue_name, "taskgate-api listening");
    axum::serve(listener, app(st))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error=%e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    pipeline.shutdown().await;
    telemetry.shutdown();
    Ok(())
}
