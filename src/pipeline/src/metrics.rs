//! Prometheus metrics for the pipeline

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, HistogramVec,
    IntCounter,
};

lazy_static! {
    /// Terminal decisions by outcome
    pub static ref DECISIONS_TOTAL: CounterVec = register_counter_vec!(
        "veriflow_decisions_total",
        "Terminal pipeline decisions by outcome",
        &["outcome"]
    )
    .expect("metric registration");

    /// Per-layer wall-clock latency in seconds
    pub static ref LAYER_LATENCY_SECONDS: HistogramVec = register_histogram_vec!(
        "veriflow_layer_latency_seconds",
        "Validation layer latency",
        &["layer"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]
    )
    .expect("metric registration");

    /// Fraud assessments that ran on the deterministic fallback path
    pub static ref ORACLE_FALLBACKS_TOTAL: IntCounter = register_int_counter!(
        "veriflow_oracle_fallbacks_total",
        "Fraud assessments served by the fallback estimator"
    )
    .expect("metric registration");

    /// Idempotent re-submissions answered from the decision cache
    pub static ref CACHED_DECISIONS_TOTAL: IntCounter = register_int_counter!(
        "veriflow_cached_decisions_total",
        "Re-submissions answered from the terminal decision cache"
    )
    .expect("metric registration");
}

/// Record a terminal decision
pub fn record_decision(outcome: &str) {
    DECISIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record one layer's latency
pub fn observe_layer(layer: &str, elapsed_ms: u64) {
    LAYER_LATENCY_SECONDS
        .with_label_values(&[layer])
        .observe(elapsed_ms as f64 / 1_000.0);
}

/// Record a fallback engagement
pub fn record_fallback() {
    ORACLE_FALLBACKS_TOTAL.inc();
}

/// Record a cache hit on re-submission
pub fn record_cached_decision() {
    CACHED_DECISIONS_TOTAL.inc();
}
