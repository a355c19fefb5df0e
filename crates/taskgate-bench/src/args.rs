use clap::Parser;

#[derive(Debug, Parser)]
pub struct Args {
    /// Number of sequential runs. Values below 1 run once.
    #[arg(long, env = "REPEAT", default_value_t = 10)]
    pub repeat: i64,

    /// Full URL of the run endpoint. Runs in-process when absent.
    #[arg(long, env = "TASKGATE_API_URL")]
    pub api_url: Option<String>,

    #[arg(long, default_value_t = 25_000)]
    pub max_wait_ms: i64,

    #[arg(long, default_value_t = 28_000)]
    pub request_timeout_ms: u64,

    #[arg(long, default_value_t = 0)]
    pub delay_seconds: i64,

    #[arg(long, default_value_t = 0)]
    pub payload_bytes: i64,

    /// Bound on the whole batch.
    #[arg(long, default_value_t = 720)]
    pub batch_timeout_secs: u64,

    #[arg(long, env = "TASKGATE_QUEUE_NAME", default_value = "taskgate-requests")]
    pub queue_name: String,

    /// OTLP/HTTP collector for spans; logging only when absent.
    #[arg(long, env = "TASKGATE_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    #[arg(long, env = "TASKGATE_OTLP_TOKEN")]
    pub otlp_token: Option<String>,
}
