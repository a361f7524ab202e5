//! Prometheus metrics endpoint.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};

use crate::metrics::{self, QueueMetrics};
use crate::notification::JobStatus;
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    update_metrics_from_state(&state);

    match metrics::encode_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Refresh gauges that mirror queue state
fn update_metrics_from_state(state: &AppState) {
    let stats = state.queue.stats();

    for status in JobStatus::ALL {
        let count = match status {
            JobStatus::Pending => stats.pending,
            JobStatus::Scheduled => stats.scheduled,
            JobStatus::Sent => stats.sent,
            JobStatus::Failed => stats.failed,
        };
        QueueMetrics::set_jobs(status.as_str(), count);
    }
}
