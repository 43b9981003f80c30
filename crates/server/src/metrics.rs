//! Prometheus metrics wiring

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder
///
/// Returns the render handle served at `/metrics`. Installing twice (tests)
/// falls back to a detached handle instead of panicking.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    match builder.install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder already installed");
            PrometheusBuilder::new()
                .build_recorder()
                .handle()
        }
    }
}
