pub mod handlers;
pub mod metrics;
pub mod service;
pub mod state;
pub mod submit;
pub mod waiter;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub use service::RunService;
pub use state::AppState;
pub use waiter::{WaitOutcome, WaitPolicy};

pub fn app(st: AppState) -> Router {
    Router::new()
        .route("/run", post(handlers::run))
        .route("/healthz", get(handlers::healthz))
        .route("/health", get(handlers::healthz))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(middleware::from_fn_with_state(
            st.clone(),
            metrics::track_requests,
        ))
        .with_state(st)
}
