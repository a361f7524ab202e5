//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::notification::QueueStats;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub catalog: CatalogHealthResponse,
    pub notifications: QueueStats,
}

#[derive(Debug, Serialize)]
pub struct CatalogHealthResponse {
    pub properties: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let properties = state.catalog.len();
    let status = if properties > 0 { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        catalog: CatalogHealthResponse { properties },
        notifications: state.queue.stats(),
    })
}
