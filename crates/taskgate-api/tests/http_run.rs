use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use taskgate_api::metrics::Metrics;
use taskgate_api::{app, AppState, RunService, WaitPolicy};
use taskgate_common::{RunResponse, RunStatus, TimestampSet};
use taskgate_meta::MemoryStatusStore;
use taskgate_worker::{Pipeline, PipelineConfig};

struct Harness {
    base: String,
    pipeline: Pipeline,
    http: reqwest::Client,
}

async fn spawn(policy: WaitPolicy, request_deadline: Option<Duration>) -> Harness {
    let pipeline = Pipeline::in_memory(
        PipelineConfig::default(),
        Arc::new(MemoryStatusStore::new()),
    );
    let st = AppState {
        service: Arc::new(RunService::new(pipeline.engine(), policy)),
        metrics: Arc::new(Metrics::default()),
        request_deadline,
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(st)).await.unwrap();
    });
    Harness {
        base: format!("http://{addr}"),
        pipeline,
        http: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn test_run_round_trip_over_http() {
    let h = spawn(WaitPolicy::default(), None).await;

    let resp = h
        .http
        .post(format!("{}/run", h.base))
        .json(&json!({"runId": "run-http", "messageBodyBytes": 32, "maxWaitMs": 5000}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: RunResponse = resp.json().await.unwrap();
    assert_eq!(body.status, RunStatus::Succeeded);
    assert!(body.execution_id.is_some());

    let ts: TimestampSet = serde_json::from_value(body.output.unwrap()).unwrap();
    assert_eq!(ts.run_id, "run-http");
    assert!(ts.receive_unix_nano > 0);
    assert!(ts.queue_sent_timestamp_ms > 0);

    let metrics = h
        .http
        .get(format!("{}/metrics", h.base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("taskgate_api_runs_succeeded 1\n"));

    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn test_blank_body_uses_defaults() {
    let h = spawn(WaitPolicy::default(), None).await;
    let resp = h
        .http
        .post(format!("{}/run", h.base))
        .body("")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: RunResponse = resp.json().await.unwrap();
    let ts: TimestampSet = serde_json::from_value(body.output.unwrap()).unwrap();
    assert!(ts.run_id.starts_with("run-"));
    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn test_invalid_json_is_rejected() {
    let h = spawn(WaitPolicy::default(), None).await;
    let resp = h
        .http
        .post(format!("{}/run", h.base))
        .body("{oops")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: RunResponse = resp.json().await.unwrap();
    assert_eq!(body.status, RunStatus::Error);
    assert!(body.error.unwrap().starts_with("invalid json body:"));
    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn test_delayed_work_times_out_with_504() {
    let h = spawn(WaitPolicy::default(), None).await;
    let resp = h
        .http
        .post(format!("{}/run", h.base))
        .json(&json!({"delaySeconds": 5, "maxWaitMs": 300}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 504);
    let body: RunResponse = resp.json().await.unwrap();
    assert_eq!(body.status, RunStatus::Timeout);
    assert!(body.total_ms >= 300);
    assert!(body.execution_id.is_some());
    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn test_gateway_deadline_too_close() {
    // remaining time is at most the 250ms safety margin, so nothing is started
    let h = spawn(WaitPolicy::default(), Some(Duration::from_millis(250))).await;
    let resp = h
        .http
        .post(format!("{}/run", h.base))
        .json(&json!({"maxWaitMs": 5000}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 504);
    let body: RunResponse = resp.json().await.unwrap();
    assert_eq!(body.status, RunStatus::Timeout);
    assert_eq!(body.error.as_deref(), Some("deadline too close"));
    assert_eq!(body.total_ms, 0);
    assert!(body.execution_id.is_none());
    assert_eq!(h.pipeline.memory_engine().execution_count().await, 0);

    let metrics = h
        .http
        .get(format!("{}/metrics", h.base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("taskgate_api_responses_5xx 1\n"));
    assert!(metrics.contains("taskgate_api_runs_timeout 1\n"));
    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn test_wrong_field_types_are_rejected() {
    let h = spawn(WaitPolicy::default(), None).await;
    for body in [r#"{"delaySeconds": "soon"}"#, "[1, 2]", "42"] {
        let resp = h
            .http
            .post(format!("{}/run", h.base))
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "{body}");
        let parsed: RunResponse = resp.json().await.unwrap();
        assert_eq!(parsed.status, RunStatus::Error);
        assert_eq!(parsed.total_ms, 0);
        assert!(parsed.error.unwrap().starts_with("invalid json body:"));
    }
    assert_eq!(h.pipeline.memory_engine().execution_count().await, 0);
    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn test_oversized_payload_hint_still_answers() {
    let h = spawn(WaitPolicy::default(), None).await;
    let resp = h
        .http
        .post(format!("{}/run", h.base))
        .json(&json!({"messageBodyBytes": i64::MAX, "maxWaitMs": 5000}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: RunResponse = resp.json().await.unwrap();
    assert_eq!(body.status, RunStatus::Succeeded);

    // the server is still up
    let health = h
        .http
        .get(format!("{}/healthz", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 200);
    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn test_healthz() {
    let h = spawn(WaitPolicy::default(), None).await;
    let text = h
        .http
        .get(format!("{}/healthz", h.base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(text, "ok");
    h.pipeline.shutdown().await;
}
