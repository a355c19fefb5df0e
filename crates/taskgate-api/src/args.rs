use clap::Parser;

#[derive(Debug, Parser)]
pub struct Args {
    #[arg(long, env = "TASKGATE_API_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Wait used when a request does not carry maxWaitMs.
    #[arg(long, default_value_t = 25_000)]
    pub default_wait_ms: u64,

    /// Ceiling for any request's wait.
    #[arg(long, default_value_t = 28_000)]
    pub max_wait_ms: u64,

    #[arg(long, default_value_t = 250)]
    pub deadline_margin_ms: u64,

    /// Delay between status queries. Must be at least 1.
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,

    /// Per-request deadline enforced in front of this service. 0 disables it.
    #[arg(long, env = "TASKGATE_REQUEST_DEADLINE_MS", default_value_t = 29_000)]
    pub request_deadline_ms: u64,

    /// How long an execution may wait for its worker.
    #[arg(long, default_value_t = 60)]
    pub task_timeout_secs: u64,

    #[arg(long, env = "TASKGATE_QUEUE_NAME", default_value = "taskgate-requests")]
    pub queue_name: String,

    #[arg(long, env = "TASKGATE_REGION", default_value = "local")]
    pub region: String,

    #[arg(long, default_value_t = 3)]
    pub max_receive_count: i64,

    /// Status store; an in-process store is used when absent.
    #[arg(long, env = "TASKGATE_ETCD_ENDPOINT")]
    pub etcd_endpoint: Option<String>,

    /// OTLP/HTTP collector for spans; logging only when absent.
    #[arg(long, env = "TASKGATE_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    #[arg(long, env = "TASKGATE_OTLP_TOKEN")]
    pub otlp_token: Option<String>,
}
