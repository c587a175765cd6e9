use anyhow::Result;
use opentelemetry::trace::TracerProvider;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace as sdktrace, Resource};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::{prelude::*, Registry};

/// Keeps the span exporter alive; flushes pending spans on drop.
#[must_use = "dropping the guard shuts the exporter down"]
pub struct TracingGuard {
    provider: Option<sdktrace::SdkTracerProvider>,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to flush spans: {e}");
            }
        }
    }
}

/// `RUST_LOG` wins over the configured level; an unparsable level falls back to `info`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn otlp_provider(service_name: &str, endpoint: &str) -> Result<sdktrace::SdkTracerProvider> {
    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// Initialize the global subscriber.
///
/// Log lines go to stderr so command output on stdout stays machine-readable.
/// Spans are exported over OTLP only when an endpoint is given.
pub fn init(
    service_name: &str,
    otlp_endpoint: Option<&str>,
    logging_mode: &str,
    level: &str,
) -> Result<TracingGuard> {
    let filter = build_filter(level);

    let fmt_layer: Box<dyn tracing_subscriber::Layer<Registry> + Send + Sync> = match logging_mode {
        "json" => Box::new(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_filter(filter),
        ),
        "pretty" => Box::new(
            fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        ),
        _ => Box::new(
            fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        ),
    };

    let provider = match otlp_endpoint {
        Some(endpoint) => Some(otlp_provider(service_name, endpoint)?),
        None => None,
    };
    let otel_layer = provider
        .as_ref()
        .map(|p| OpenTelemetryLayer::new(p.tracer(service_name.to_string())));

    let subscriber = Registry::default().with(fmt_layer).with(otel_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(TracingGuard { provider })
}
