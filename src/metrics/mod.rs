//! Prometheus metrics for the dispatch pipeline.
//!
//! Counters cover the pipeline's observable events:
//! - Job outcomes (delivered, skipped, failed) by channel
//! - Cache hits and misses by cached entity
//! - Calls rejected by an open circuit, by upstream operation
//! - Delivery attempts by channel
//! - Job duration histogram by channel

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "courier";

lazy_static! {
    /// Job outcomes by channel
    pub static ref JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_jobs_total", METRIC_PREFIX),
        "Notification jobs processed, by channel and outcome",
        &["channel", "outcome"]
    ).unwrap();

    /// Cache hits by entity (recipient, template)
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_cache_hits_total", METRIC_PREFIX),
        "Cache-aside hits, by entity",
        &["entity"]
    ).unwrap();

    /// Cache misses by entity (recipient, template)
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_cache_misses_total", METRIC_PREFIX),
        "Cache-aside misses, by entity",
        &["entity"]
    ).unwrap();

    /// Calls rejected without reaching the upstream, by operation
    pub static ref BREAKER_REJECTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_breaker_rejected_total", METRIC_PREFIX),
        "Upstream calls rejected by an open circuit, by operation",
        &["operation"]
    ).unwrap();

    /// Delivery attempts handed to a provider, by channel and result
    pub static ref DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Delivery attempts, by channel and result",
        &["channel", "result"]
    ).unwrap();

    /// End-to-end job duration in seconds, by channel
    pub static ref JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        format!("{}_job_duration_seconds", METRIC_PREFIX),
        "End-to-end job processing duration in seconds",
        &["channel"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
}

/// Encode all registered metrics in the Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
