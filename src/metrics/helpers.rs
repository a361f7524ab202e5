//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    NEGOTIATIONS_TOTAL, NOTIFICATION_DELIVERY_ATTEMPTS_TOTAL, NOTIFICATION_JOBS,
    NOTIFICATION_JOBS_COMPLETED_TOTAL, NOTIFICATION_JOBS_ENQUEUED_TOTAL,
    NOTIFICATION_JOBS_EVICTED_TOTAL, NOTIFICATION_QUEUE_PASS_DURATION,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording negotiation metrics
pub struct NegotiationMetrics;

impl NegotiationMetrics {
    /// Record a negotiation outcome label (e.g. "discount", "not-found")
    pub fn record_outcome(outcome: &str) {
        NEGOTIATIONS_TOTAL.with_label_values(&[outcome]).inc();
    }
}

/// Helper struct for recording notification queue metrics
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn record_enqueued(kind: &str) {
        NOTIFICATION_JOBS_ENQUEUED_TOTAL
            .with_label_values(&[kind])
            .inc();
    }

    /// Record one channel delivery attempt
    pub fn record_attempt(channel: &str, result: &str) {
        NOTIFICATION_DELIVERY_ATTEMPTS_TOTAL
            .with_label_values(&[channel, result])
            .inc();
    }

    pub fn record_completed(status: &str) {
        NOTIFICATION_JOBS_COMPLETED_TOTAL
            .with_label_values(&[status])
            .inc();
    }

    pub fn record_evicted(count: u64) {
        NOTIFICATION_JOBS_EVICTED_TOTAL.inc_by(count);
    }

    pub fn record_pass_duration(seconds: f64) {
        NOTIFICATION_QUEUE_PASS_DURATION.observe(seconds);
    }

    /// Set the per-status job gauge
    pub fn set_jobs(status: &str, count: usize) {
        NOTIFICATION_JOBS
            .with_label_values(&[status])
            .set(count as i64);
    }
}
