use std::sync::Arc;
use std::time::Duration;

use crate::metrics::Metrics;
use crate::service::RunService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RunService>,
    pub metrics: Arc<Metrics>,
    /// Deadline the fronting gateway enforces on each request, if any.
    pub request_deadline: Option<Duration>,
}
