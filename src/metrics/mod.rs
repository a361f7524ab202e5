//! Prometheus metrics for the offers service.
//!
//! - Negotiation metrics (offers issued, no-offer and error outcomes)
//! - Notification queue metrics (enqueued jobs, delivery attempts, terminal jobs)
//! - Queue pass latency

mod helpers;

pub use helpers::{encode_metrics, NegotiationMetrics, QueueMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge_vec,
    Histogram, IntCounter, IntCounterVec, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "hotelsaver";

lazy_static! {
    // ============================================================================
    // Negotiation Metrics
    // ============================================================================

    /// Negotiation requests by outcome (discount, no-offer reason, error reason)
    pub static ref NEGOTIATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_negotiations_total", METRIC_PREFIX),
        "Total negotiation requests by outcome",
        &["outcome"]
    ).unwrap();

    // ============================================================================
    // Notification Queue Metrics
    // ============================================================================

    /// Jobs accepted by the queue, by notification type
    pub static ref NOTIFICATION_JOBS_ENQUEUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notification_jobs_enqueued_total", METRIC_PREFIX),
        "Total notification jobs enqueued",
        &["type"]
    ).unwrap();

    /// Delivery attempts by channel and result (sent, transient, permanent)
    pub static ref NOTIFICATION_DELIVERY_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notification_delivery_attempts_total", METRIC_PREFIX),
        "Total channel delivery attempts",
        &["channel", "result"]
    ).unwrap();

    /// Jobs reaching a terminal status
    pub static ref NOTIFICATION_JOBS_COMPLETED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notification_jobs_completed_total", METRIC_PREFIX),
        "Total notification jobs reaching sent or failed",
        &["status"]
    ).unwrap();

    /// Terminal jobs removed by the retention policy
    pub static ref NOTIFICATION_JOBS_EVICTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notification_jobs_evicted_total", METRIC_PREFIX),
        "Total terminal notification jobs evicted"
    ).unwrap();

    /// Jobs currently held in memory, by status
    pub static ref NOTIFICATION_JOBS: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_notification_jobs", METRIC_PREFIX),
        "Notification jobs held in memory by status",
        &["status"]
    ).unwrap();

    /// Duration of one queue processing pass
    pub static ref NOTIFICATION_QUEUE_PASS_DURATION: Histogram = register_histogram!(
        format!("{}_notification_queue_pass_duration_seconds", METRIC_PREFIX),
        "Duration of a notification queue processing pass in seconds",
        vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    ).unwrap();
}
