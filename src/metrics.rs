// Prometheus metrics definitions for the Duel backend.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Counters ─────────────────────────────────────────────────────

    /// Settlement requests, by result (processed, already_processed,
    /// rejected, failed).
    pub static ref SETTLEMENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("duel_settlements_total", "Settlement requests"),
        &["result"],
    )
    .unwrap();

    /// Total gold credited by match rewards.
    pub static ref GOLD_GRANTED_TOTAL: IntCounter = IntCounter::new(
        "duel_gold_granted_total",
        "Gold credited by match rewards",
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Settlement processing time in seconds, transaction included.
    pub static ref SETTLEMENT_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "duel_settlement_duration_seconds",
            "Settlement processing time in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SETTLEMENTS_TOTAL.clone()),
        Box::new(GOLD_GRANTED_TOTAL.clone()),
        Box::new(SETTLEMENT_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        REGISTRY.register(c).expect("failed to register metric");
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics_returns_string() {
        // Register and gather -- should not panic
        register_metrics();
        let output = gather_metrics();
        assert!(output.is_empty() || output.contains("duel_"));
    }

    #[test]
    fn test_metric_increments() {
        SETTLEMENTS_TOTAL.with_label_values(&["processed"]).inc();
        SETTLEMENTS_TOTAL
            .with_label_values(&["already_processed"])
            .inc();
        GOLD_GRANTED_TOTAL.inc_by(15);
        SETTLEMENT_DURATION_SECONDS.observe(0.02);
    }
}
