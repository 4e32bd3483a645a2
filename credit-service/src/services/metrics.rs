//! Prometheus metrics for credit-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Charges attempted, by action and outcome (ok, insufficient, error).
pub static CREDIT_CHARGES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "credit_charges_total",
        "Total number of credit-metered actions",
        &["action", "status"]
    )
    .expect("Failed to register credit_charges_total")
});

/// Credits consumed, by action.
pub static CREDITS_CONSUMED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "credit_consumed_total",
        "Total credits consumed by metered actions",
        &["action"]
    )
    .expect("Failed to register credit_consumed_total")
});

/// Top-up confirmations, by outcome (applied, duplicate, rejected).
pub static TOP_UPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "credit_top_ups_total",
        "Total top-up confirmations",
        &["outcome"]
    )
    .expect("Failed to register credit_top_ups_total")
});

pub static CREDITS_PURCHASED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "credit_purchased_total",
        "Total credits added by verified payments"
    )
    .expect("Failed to register credit_purchased_total")
});

/// Procedure attempts that lost a race and were retried.
pub static CONFLICT_RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "credit_conflicts_total",
        "Total write conflicts reported by the store",
        &["operation"]
    )
    .expect("Failed to register credit_conflicts_total")
});

/// Store operation duration histogram.
pub static STORE_OPERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "credit_store_operation_duration_seconds",
        "Ledger store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register credit_store_operation_duration")
});

/// Install the recorder behind the HTTP metrics middleware.
pub fn init_metrics() {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "Failed to install Prometheus recorder"),
    }
}

/// HTTP metrics followed by the ledger's own counters, in text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&prometheus::gather()) {
        Ok(ledger_metrics) => output.push_str(&ledger_metrics),
        Err(e) => tracing::warn!(error = %e, "Failed to encode ledger metrics"),
    }

    output
}
