//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod metrics;
mod negotiate;
mod notifications;
mod routes;

pub use health::{health, HealthResponse};
pub use metrics::prometheus_metrics;
pub use negotiate::{negotiate, verify_offer, NegotiateRejection, NegotiateResponse};
pub use notifications::{
    enqueue_notification, notification_status, process_notifications, retry_notification,
    EnqueueRequest, EnqueueResponse,
};
pub use routes::api_routes;
