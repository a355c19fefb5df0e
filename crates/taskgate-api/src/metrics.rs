use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use taskgate_common::RunStatus;

use crate::state::AppState;

#[derive(Debug, Default)]
pub struct Metrics {
    pub requests_total: AtomicU64,
    pub requests_inflight: AtomicU64,
    pub status_2xx: AtomicU64,
    pub status_4xx: AtomicU64,
    pub status_5xx: AtomicU64,

    pub runs_succeeded: AtomicU64,
    pub runs_failed: AtomicU64,
    pub runs_timed_out: AtomicU64,
    pub runs_error: AtomicU64,
}

impl Metrics {
    pub fn record_run(&self, status: RunStatus) {
        let counter = match status {
            RunStatus::Succeeded => &self.runs_succeeded,
            RunStatus::Failed | RunStatus::Aborted | RunStatus::TimedOut => &self.runs_failed,
            RunStatus::Timeout => &self.runs_timed_out,
            RunStatus::Error => &self.runs_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn response_class(&self, status: StatusCode) -> Option<&AtomicU64> {
        if status.is_server_error() {
            Some(&self.status_5xx)
        } else if status.is_client_error() {
            Some(&self.status_4xx)
        } else if status.is_success() {
            Some(&self.status_2xx)
        } else {
            None
        }
    }

    pub fn render(&self) -> String {
        let lines = [
            ("taskgate_api_requests_total", &self.requests_total),
            ("taskgate_api_requests_inflight", &self.requests_inflight),
            ("taskgate_api_responses_2xx", &self.status_2xx),
            ("taskgate_api_responses_4xx", &self.status_4xx),
            ("taskgate_api_responses_5xx", &self.status_5xx),
            ("taskgate_api_runs_succeeded", &self.runs_succeeded),
            ("taskgate_api_runs_failed", &self.runs_failed),
            ("taskgate_api_runs_timeout", &self.runs_timed_out),
            ("taskgate_api_runs_error", &self.runs_error),
        ];
        lines
            .iter()
            .map(|(name, v)| format!("{name} {}\n", v.load(Ordering::Relaxed)))
            .collect()
    }
}

pub async fn metrics_handler(State(st): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, st.metrics.render())
}

/// Holds one slot in `requests_inflight` until dropped, so aborted requests release it too.
struct Inflight<'a>(&'a AtomicU64);

impl<'a> Inflight<'a> {
    fn enter(gauge: &'a AtomicU64) -> Self {
        gauge.fetch_add(1, Ordering::Relaxed);
        Self(gauge)
    }
}

impl Drop for Inflight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Counts every request to the run service by response class.
pub async fn track_requests(State(st): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let resp = {
        let _inflight = Inflight::enter(&st.metrics.requests_inflight);
        next.run(req).await
    };
    st.metrics.requests_total.fetch_add(1, Ordering::Relaxed);
    if let Some(counter) = st.metrics.response_class(resp.status()) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
    resp
}
