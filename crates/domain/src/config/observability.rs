use serde::{Deserialize, Serialize};

use super::{env_bool, env_opt, env_parse};
use crate::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observability configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Metrics endpoint and optional OpenTelemetry bridge.
///
/// When `otlp_endpoint` is `None` (the default), no OTel exporter is
/// started and the process emits structured logs plus the Prometheus
/// scrape endpoint only. Setting `otlp_endpoint` enables OTLP/gRPC
/// trace export for every `tracing` span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// `RW_METRICS_ENABLED` — serve the Prometheus scrape endpoint.
    #[serde(default = "d_true")]
    pub metrics_enabled: bool,
    /// `RW_METRICS_HOST` — bind host for the scrape endpoint.
    #[serde(default = "d_metrics_host")]
    pub metrics_host: String,
    /// `RW_METRICS_PORT` — bind port for the scrape endpoint.
    #[serde(default = "d_metrics_port")]
    pub metrics_port: u16,
    /// `RW_OTLP_ENDPOINT` — OTLP gRPC endpoint (e.g.
    /// `http://localhost:4317`). When unset, OTel export is disabled.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    /// `RW_SERVICE_NAME` — `service.name` resource attribute.
    #[serde(default = "d_service_name")]
    pub service_name: String,
    /// `RW_TRACE_SAMPLE_RATE` — trace sampling ratio (0.0..=1.0).
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
}

fn d_true() -> bool {
    true
}
fn d_metrics_host() -> String {
    "0.0.0.0".into()
}
fn d_metrics_port() -> u16 {
    9464
}
fn d_service_name() -> String {
    "rivalwatch".into()
}
fn d_sample_rate() -> f64 {
    1.0
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: d_true(),
            metrics_host: d_metrics_host(),
            metrics_port: d_metrics_port(),
            otlp_endpoint: None,
            service_name: d_service_name(),
            sample_rate: d_sample_rate(),
        }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            metrics_enabled: env_bool("RW_METRICS_ENABLED", d.metrics_enabled)?,
            metrics_host: env_opt("RW_METRICS_HOST").unwrap_or(d.metrics_host),
            metrics_port: env_parse("RW_METRICS_PORT", d.metrics_port)?,
            otlp_endpoint: env_opt("RW_OTLP_ENDPOINT"),
            service_name: env_opt("RW_SERVICE_NAME").unwrap_or(d.service_name),
            sample_rate: env_parse("RW_TRACE_SAMPLE_RATE", d.sample_rate)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_otlp_endpoint() {
        let cfg = ObservabilityConfig::default();
        assert!(cfg.otlp_endpoint.is_none());
        assert!(cfg.metrics_enabled);
        assert_eq!(cfg.metrics_port, 9464);
    }

    #[test]
    fn deserialize_with_endpoint() {
        let cfg: ObservabilityConfig = toml::from_str(
            r#"
            otlp_endpoint = "http://localhost:4317"
            sample_rate = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.otlp_endpoint.as_deref(), Some("http://localhost:4317"));
        assert!((cfg.sample_rate - 0.5).abs() < f64::EPSILON);
    }
}
