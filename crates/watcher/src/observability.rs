//! Logging, metrics endpoint, and the optional OpenTelemetry bridge.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry_otlp::WithExportConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use rw_domain::config::ObservabilityConfig;
use rw_domain::{Error, Result};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,rw_watcher=debug"))
}

/// Initialize structured logging. When an OTLP endpoint is configured,
/// every span is also exported over OTLP/gRPC.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    match &config.otlp_endpoint {
        Some(endpoint) => {
            use opentelemetry::trace::TracerProvider as _;
            use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
            use opentelemetry_sdk::Resource;

            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint.clone())
                .build()
                .map_err(|e| Error::Config(format!("otlp exporter: {e}")))?;
            let provider = SdkTracerProvider::builder()
                .with_batch_exporter(exporter)
                .with_sampler(Sampler::TraceIdRatioBased(config.sample_rate))
                .with_resource(
                    Resource::builder()
                        .with_service_name(config.service_name.clone())
                        .build(),
                )
                .build();
            let tracer = provider.tracer("rivalwatch");
            opentelemetry::global::set_tracer_provider(provider);

            tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer().json())
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(env_filter()).json().init();
        }
    }
    Ok(())
}

/// Install the Prometheus scrape endpoint and register the metric
/// descriptions.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if !config.metrics_enabled {
        return Ok(());
    }
    let addr: SocketAddr = format!("{}:{}", config.metrics_host, config.metrics_port)
        .parse()
        .map_err(|e| Error::Config(format!("metrics listener address: {e}")))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| Error::Config(format!("metrics exporter: {e}")))?;

    describe_metrics();
    tracing::info!(%addr, "metrics endpoint listening");
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!(
        "scraper_requests_total",
        "Fetch attempts by terminal disposition and source kind"
    );
    metrics::describe_counter!(
        "scraper_duplicate_requests_total",
        "Ingestion items skipped because their source_url already exists"
    );
    metrics::describe_gauge!(
        "scraper_dead_urls_count",
        "Currently disabled candidate URLs per company"
    );
    metrics::describe_counter!("tasks_total", "Completed runtime tasks by queue and status");
    metrics::describe_gauge!("tasks_in_progress", "Tasks currently executing per queue");
    metrics::describe_histogram!("task_duration_seconds", "Task execution time per queue");
    metrics::describe_histogram!(
        "digest_duration_seconds",
        "End-to-end digest generation time by digest type"
    );
}
