mod args;

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;

use taskgate_api::{RunService, WaitPolicy};
use taskgate_bench::{render_result, run_batch, BatchOptions, HttpRunClient, InProcessClient, RunClient};
use taskgate_meta::MemoryStatusStore;
use taskgate_worker::{Pipeline, PipelineConfig};

use crate::args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let telemetry = taskgate_common::telemetry::init_tracing(
        "taskgate-bench",
        args.otlp_endpoint.as_deref(),
        args.otlp_token.as_deref(),
    );

    let mut pipeline = None;
    let (backend, client): (&str, Box<dyn RunClient>) = match args.api_url.as_deref() {
        Some(url) => (
            "http",
            Box::new(HttpRunClient::new(
                url,
                Duration::from_millis(args.request_timeout_ms),
            )?),
        ),
        None => {
            let p = Pipeline::in_memory(
                PipelineConfig {
                    queue_name: args.queue_name.clone(),
                    ..Default::default()
                },
                Arc::new(MemoryStatusStore::new()),
            );
            let service = Arc::new(RunService::new(p.engine(), WaitPolicy::default()));
            let target = format!("in-process://{}", p.queue_name());
            pipeline = Some(p);
            ("in-process", Box::new(InProcessClient::new(service, target)))
        }
    };

    let opts = BatchOptions {
        repeat: args.repeat.max(1) as usize,
        max_wait_ms: args.max_wait_ms,
        delay_seconds: args.delay_seconds,
        payload_bytes: args.payload_bytes,
    };
    tracing::info!(backend, api=%client.target(), repeat = opts.repeat, "starting batch");

    let batch = tokio::time::timeout(
        Duration::from_secs(args.batch_timeout_secs),
        run_batch(client.as_ref(), &opts),
    )
    .await
    .map_err(|_| anyhow!("batch did not finish within {}s", args.batch_timeout_secs))
    .and_then(|r| r);

    if let Some(p) = pipeline {
        p.shutdown().await;
    }
    telemetry.shutdown();

    let report = batch?;
    print!("{}", render_result(backend, &client.target(), &report));
    Ok(())
}
