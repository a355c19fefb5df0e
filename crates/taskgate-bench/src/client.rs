use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;

use taskgate_api::RunService;
use taskgate_common::{CallContext, RunRequest, RunResponse, RunStatus};

/// Anything that can perform one synchronous run.
#[async_trait]
pub trait RunClient: Send + Sync {
    /// Where runs go, for the report header.
    fn target(&self) -> String;

    async fn run(&self, req: &RunRequest) -> Result<RunResponse>;
}

/// An `ERROR` answer with a message is a failed call, not a run result.
fn reject_error_status(resp: RunResponse) -> Result<RunResponse> {
    if resp.status == RunStatus::Error {
        if let Some(msg) = resp.error.as_deref().filter(|m| !m.is_empty()) {
            bail!("api error: {msg}");
        }
    }
    Ok(resp)
}

/// Calls a [`RunService`] in this process.
pub struct InProcessClient {
    service: Arc<RunService>,
    target: String,
}

impl InProcessClient {
    pub fn new(service: Arc<RunService>, target: impl Into<String>) -> Self {
        Self {
            service,
            target: target.into(),
        }
    }
}

#[async_trait]
impl RunClient for InProcessClient {
    fn target(&self) -> String {
        self.target.clone()
    }

    async fn run(&self, req: &RunRequest) -> Result<RunResponse> {
        let resp = self.service.run_sync(&CallContext::background(), req).await;
        reject_error_status(resp)
    }
}

/// Calls the HTTP run endpoint.
pub struct HttpRunClient {
    http: reqwest::Client,
    url: String,
}

impl HttpRunClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(28);

    /// `url` is the full run endpoint; a trailing `/` is ignored.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = url.trim().trim_end_matches('/').to_string();
        if url.is_empty() {
            bail!("missing api endpoint");
        }
        let timeout = if timeout.is_zero() {
            Self::DEFAULT_TIMEOUT
        } else {
            timeout
        };
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl RunClient for HttpRunClient {
    fn target(&self) -> String {
        self.url.clone()
    }

    async fn run(&self, req: &RunRequest) -> Result<RunResponse> {
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| anyhow!("http request: {e}"))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| anyhow!("read response: {e}"))?;
        if !status.is_success() {
            bail!("api status={} body={}", status.as_u16(), body);
        }

        let out: RunResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("unmarshal response: {e} (body={body})"))?;
        reject_error_status(out)
    }
}
