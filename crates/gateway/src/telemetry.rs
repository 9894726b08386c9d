//! Tracing subscriber and Prometheus recorder setup.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{LogConfig, LogFormat};
use crate::error::StartupError;

/// Installs the global tracing subscriber.
///
/// An unparsable filter falls back to `info` rather than failing startup.
pub fn init_tracing(log: &LogConfig) -> Result<(), StartupError> {
    let filter = EnvFilter::try_new(&log.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match log.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| StartupError::Telemetry(e.to_string()))
}

/// Installs the global Prometheus recorder and returns its render handle.
pub fn install_metrics_recorder() -> Result<PrometheusHandle, StartupError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| StartupError::Telemetry(e.to_string()))
}
