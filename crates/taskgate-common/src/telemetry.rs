use std::collections::HashMap;

use opentelemetry::trace::{TraceError, TracerProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the span exporter alive for the life of a taskgate binary.
#[must_use = "dropping the guard without shutdown() loses buffered spans"]
pub struct TelemetryGuard {
    provider: Option<TracerProvider>,
}

impl TelemetryGuard {
    /// Flush and stop the exporter, if one was started.
    pub fn shutdown(self) {
        let Some(provider) = self.provider else {
            return;
        };
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error=%e, "span exporter shutdown failed");
        }
    }
}

/// Headers sent to the collector. A blank token sends none.
pub fn collector_headers(token: Option<&str>) -> HashMap<String, String> {
    token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| HashMap::from([("Authorization".to_string(), format!("Bearer {t}"))]))
        .unwrap_or_default()
}

fn span_provider(
    service: &str,
    endpoint: &str,
    token: Option<&str>,
) -> Result<TracerProvider, TraceError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_headers(collector_headers(token))
        .build()?;
    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(Resource::new([KeyValue::new(
            "service.name",
            service.to_string(),
        )]))
        .build())
}

/// Install the global subscriber for `service`.
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `info`); stdout carries the bench
/// report. With an `otlp_endpoint`, spans are also exported over OTLP/HTTP and the
/// exporter appends `/v1/traces`.
pub fn init_tracing(
    service: &str,
    otlp_endpoint: Option<&str>,
    otlp_token: Option<&str>,
) -> TelemetryGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (provider, build_err) = match otlp_endpoint.filter(|e| !e.trim().is_empty()) {
        None => (None, None),
        Some(endpoint) => match span_provider(service, endpoint, otlp_token) {
            Ok(p) => (Some(p), None),
            Err(e) => (None, Some(e)),
        },
    };

    let otel = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(service.to_string())));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .with(otel)
        .init();

    match (&provider, build_err) {
        (Some(_), _) => {
            let endpoint = otlp_endpoint.unwrap_or_default();
            tracing::info!(service, endpoint, "exporting spans over OTLP");
        }
        (None, Some(e)) => {
            tracing::warn!(service, error=%e, "OTLP exporter unavailable, logging only");
        }
        (None, None) => {}
    }
    TelemetryGuard { provider }
}
