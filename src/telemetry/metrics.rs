//! Prometheus metrics

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Account reads, retries included
    Read,
    /// Transaction dry runs
    Simulation,
    /// Submission through confirmation
    Submission,
    /// Blockhash round trip of the health probe
    HealthProbe,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Submissions by outcome kind
    Submissions,
    /// Backoff retries of transient failures
    RetryAttempts,
    /// Market records that failed to decode
    DecodeSkips,
    /// Cache keys dropped after a confirmed write
    CacheInvalidations,
}

impl LatencyMetric {
    fn name(self) -> &'static str {
        match self {
            Self::Read => "karmapi_read_latency_ms",
            Self::Simulation => "karmapi_simulation_latency_ms",
            Self::Submission => "karmapi_submission_latency_ms",
            Self::HealthProbe => "karmapi_health_probe_latency_ms",
        }
    }
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            Self::Submissions => "karmapi_submissions_total",
            Self::RetryAttempts => "karmapi_retry_attempts_total",
            Self::DecodeSkips => "karmapi_decode_skips_total",
            Self::CacheInvalidations => "karmapi_cache_invalidations_total",
        }
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    ::metrics::histogram!(metric.name()).record(duration.as_secs_f64() * 1_000.0);
}

/// Increment a counter, labelled with a short kind such as an outcome
pub fn increment(metric: CounterMetric, kind: &'static str) {
    ::metrics::counter!(metric.name(), "kind" => kind).increment(1);
}

/// Add `count` to an unlabelled counter
pub fn increment_by(metric: CounterMetric, count: u64) {
    ::metrics::counter!(metric.name()).increment(count);
}

/// Serve `/metrics` on `port`
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}
