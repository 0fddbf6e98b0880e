use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once: test
/// binaries spawn several applications in one process.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            METRICS_HANDLE.set(handle).ok();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder already installed, skipping");
        }
    }
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Record a donation outcome for dashboards.
pub fn record_donation(provider: &str, status: &str) {
    let labels = [
        ("provider", provider.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("donations_total", &labels).increment(1);
}

/// Record a settled donation amount in minor units.
pub fn record_donation_amount(provider: &str, currency: &str, amount_minor: u64) {
    let labels = [
        ("provider", provider.to_string()),
        ("currency", currency.to_string()),
    ];
    metrics::counter!("donation_amount_minor_total", &labels).increment(amount_minor);
}
