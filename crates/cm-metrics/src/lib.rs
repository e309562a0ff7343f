use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

pub const MATCH_REQUESTS_TOTAL: &str = "cm_match_requests_total";
pub const MATCH_LATENCY_SECONDS: &str = "cm_match_latency_seconds";
pub const MATCH_RESULTS: &str = "cm_match_results";
pub const ENGINE_HEALTH_FAILURES_TOTAL: &str = "cm_engine_health_failures_total";

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Start a Prometheus exporter on `0.0.0.0:<port>`.
///
/// Idempotent: later calls return the handle installed by the first one.
/// Without an exporter the `record_*` helpers are no-ops.
pub fn init_metrics(port: u16) -> Option<&'static PrometheusHandle> {
    if let Some(existing) = PROMETHEUS_HANDLE.get() {
        return Some(existing);
    }

    match PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install_recorder()
    {
        Ok(handle) => {
            let _ = PROMETHEUS_HANDLE.set(handle);
            info!(metrics_port = port, "started prometheus exporter");
            PROMETHEUS_HANDLE.get()
        }
        Err(err) => {
            warn!(error = %err, metrics_port = port, "failed to start prometheus exporter");
            PROMETHEUS_HANDLE.get()
        }
    }
}

/// Outcome label for one `/match` call, e.g. `ok`, `validation_error`.
pub fn record_match(engine: &str, outcome: &'static str, latency: Duration, results: usize) {
    let engine = engine.to_string();
    counter!(MATCH_REQUESTS_TOTAL, "engine" => engine.clone(), "outcome" => outcome).increment(1);
    histogram!(MATCH_LATENCY_SECONDS, "engine" => engine.clone()).record(latency.as_secs_f64());
    if outcome == "ok" {
        histogram!(MATCH_RESULTS, "engine" => engine).record(results as f64);
    }
}

pub fn record_engine_unhealthy(engine: &str) {
    counter!(ENGINE_HEALTH_FAILURES_TOTAL, "engine" => engine.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_exporter_is_a_no_op() {
        record_match("engine-basic", "ok", Duration::from_millis(3), 2);
        record_engine_unhealthy("engine-basic");
    }
}
