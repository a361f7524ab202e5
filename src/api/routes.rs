use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::health::health;
use super::metrics::prometheus_metrics;
use super::negotiate::{negotiate, verify_offer};
use super::notifications::{
    enqueue_notification, notification_status, process_notifications, retry_notification,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api",
            Router::new()
                // Negotiation
                .route("/negotiate", post(negotiate))
                .route("/negotiate/verify", post(verify_offer))
                // Notification queue
                .route(
                    "/notifications",
                    get(notification_status).post(enqueue_notification),
                )
                .route("/notifications/process", post(process_notifications))
                .route("/notifications/{job_id}/retry", post(retry_notification)),
        )
}
