//! Notification queue endpoints.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::notification::{
    deserialize_schedule, JobFilter, JobStatus, NewJob, NotificationJob, NotificationType,
    PassSummary, Recipient,
};
use crate::server::AppState;

const MISSING_FIELDS: &str = "Missing required fields: template, recipient, data";

/// Upper bound on jobs returned by a single listing
const MAX_LIST_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    #[serde(rename = "type", default)]
    pub kind: NotificationType,
    pub template: Option<String>,
    pub recipient: Option<Recipient>,
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_schedule")]
    pub scheduled_for: Option<DateTime<Utc>>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub success: bool,
    pub job_id: String,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub job_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job: NotificationJob,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<NotificationJob>,
    /// Jobs matching the filter, ignoring `limit`
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub success: bool,
    #[serde(rename = "jobId")]
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    /// False when a pass was already running
    pub processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PassSummary>,
}

/// POST /api/notifications
#[tracing::instrument(name = "http.enqueue_notification", skip_all)]
pub async fn enqueue_notification(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<EnqueueResponse>> {
    let request = parse_enqueue(&body)?;

    let (Some(template), Some(recipient), Some(data)) =
        (request.template, request.recipient, request.data)
    else {
        return Err(AppError::Validation(MISSING_FIELDS.to_string()));
    };

    let job_id = state
        .queue
        .enqueue(NewJob {
            kind: request.kind,
            template,
            recipient,
            data,
            scheduled_for: request.scheduled_for,
            max_attempts: request.max_attempts,
        })
        .map_err(|e| AppError::Validation(e.to_string()))?;

    Ok(Json(EnqueueResponse {
        success: true,
        job_id,
        message: "Notification queued successfully",
    }))
}

/// Decode the body regardless of content type.
fn parse_enqueue(body: &[u8]) -> Result<EnqueueRequest> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected notification body");
        AppError::Validation("Request body must be valid JSON".to_string())
    })?;
    if !value.is_object() {
        return Err(AppError::Validation(MISSING_FIELDS.to_string()));
    }

    serde_json::from_value(value).map_err(|e| AppError::Validation(e.to_string()))
}

/// GET /api/notifications?jobId=...&status=...&limit=...
#[tracing::instrument(name = "http.notification_status", skip_all)]
pub async fn notification_status(
    State(state): State<AppState>,
    query: std::result::Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    if let Some(job_id) = query.job_id {
        let job = state
            .queue
            .job(&job_id)
            .ok_or_else(|| AppError::NotFound("Notification job not found".to_string()))?;
        return Ok(Json(JobResponse { job }).into_response());
    }

    let status = query
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()
        .map_err(AppError::Validation)?;
    let limit = query.limit.unwrap_or(MAX_LIST_LIMIT).min(MAX_LIST_LIMIT);

    let page = state.queue.page(&JobFilter {
        status,
        limit: Some(limit),
    });

    Ok(Json(JobsResponse {
        jobs: page.jobs,
        total: page.total,
    })
    .into_response())
}

/// POST /api/notifications/{job_id}/retry
#[tracing::instrument(name = "http.retry_notification", skip(state))]
pub async fn retry_notification(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<RetryResponse>> {
    let job = state
        .queue
        .job(&job_id)
        .ok_or_else(|| AppError::NotFound("Notification job not found".to_string()))?;

    if !state.queue.retry_failed_job(&job_id) {
        return Err(AppError::Conflict(format!(
            "Notification job is {}, only failed jobs can be retried",
            job.status.as_str()
        )));
    }

    Ok(Json(RetryResponse {
        success: true,
        job_id,
    }))
}

/// POST /api/notifications/process
#[tracing::instrument(name = "http.process_notifications", skip_all)]
pub async fn process_notifications(State(state): State<AppState>) -> Json<ProcessResponse> {
    let summary = state.queue.process_queue().await;

    Json(ProcessResponse {
        processed: summary.is_some(),
        summary,
    })
}
