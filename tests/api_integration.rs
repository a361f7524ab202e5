//! HTTP integration tests
//!
//! Drive the full axum router in-process with `tower::ServiceExt::oneshot`,
//! backed by an in-memory catalog and log transports.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use hotelsaver_offers::config::Settings;
use hotelsaver_offers::negotiation::{Property, StaticCatalog};
use hotelsaver_offers::notification::{LogEmailTransport, LogSmsTransport};
use hotelsaver_offers::server::{create_app, AppState};

fn property(id: &str, city: &str, base: Option<i64>) -> Property {
    Property {
        id: id.to_string(),
        name: format!("Hotel {id}"),
        city: city.to_string(),
        base_price_ngn: base,
        price: None,
    }
}

fn test_state() -> AppState {
    let mut settings = Settings::default();
    settings.negotiation.token_secret = Some("integration-test-secret".to_string());
    settings.negotiation.exhausted_cities = vec!["Abuja".to_string()];

    let catalog = StaticCatalog::new(
        vec![
            property("eko", "Lagos", Some(185_000)),
            property("ikoyi", "Lagos", Some(72_000)),
            property("fixed", "Lagos", Some(30_000)),
            property("unpriced", "Port Harcourt", None),
            property("transcorp", "Abuja", Some(210_000)),
        ],
        HashMap::from([("eko".to_string(), 0.2), ("fixed".to_string(), 0.0)]),
        Some(0.15),
    );

    AppState::with_components(
        settings,
        Arc::new(catalog),
        Arc::new(LogEmailTransport),
        Arc::new(LogSmsTransport),
    )
    .unwrap()
}

fn test_app() -> (Router, AppState) {
    let state = test_state();
    (create_app(state.clone()), state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn negotiate(app: &Router, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, "/api/negotiate", Some(body)).await
}

// ============================================================================
// Negotiation
// ============================================================================

#[tokio::test]
async fn test_negotiate_returns_discount() {
    let (app, _) = test_app();
    let (status, body) = negotiate(&app, json!({"propertyId": "eko"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "discount");
    assert_eq!(body["baseTotal"], 185_000);
    assert_eq!(body["discountedTotal"], 148_000);
    assert_eq!(body["savings"], 37_000);
    assert_eq!(body["property"]["city"], "Lagos");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn test_negotiate_uses_default_rate_and_nights() {
    let (app, _) = test_app();
    let (status, body) = negotiate(&app, json!({"propertyId": "ikoyi", "nights": 2})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["baseTotal"], 144_000);
    assert_eq!(body["discountedTotal"], 122_400);
    assert_eq!(body["savings"], 21_600);
}

#[tokio::test]
async fn test_negotiate_is_deterministic() {
    let (app, _) = test_app();

    let mut totals = Vec::new();
    for _ in 0..5 {
        let (_, body) = negotiate(&app, json!({"propertyId": "eko"})).await;
        totals.push((
            body["baseTotal"].clone(),
            body["discountedTotal"].clone(),
            body["savings"].clone(),
        ));
    }

    assert!(totals.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_offer_expires_within_ttl() {
    let (app, _) = test_app();
    let before = Utc::now();
    let (_, body) = negotiate(&app, json!({"propertyId": "eko"})).await;

    let expires_at: DateTime<Utc> = body["expiresAt"].as_str().unwrap().parse().unwrap();
    let remaining = (expires_at - before).num_seconds();
    assert!((280..=300).contains(&remaining), "remaining {remaining}s");
}

#[tokio::test]
async fn test_not_found_and_invalid_input_are_distinct() {
    let (app, _) = test_app();

    let (status, body) = negotiate(&app, json!({"propertyId": "nope"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"status": "no-offer", "reason": "not-found"}));

    let (status, body) = negotiate(&app, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid-propertyId");

    let (status, body) = negotiate(&app, json!({"propertyId": 7})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid-propertyId");
}

#[tokio::test]
async fn test_no_offer_reasons() {
    let (app, _) = test_app();

    let cases = [
        ("fixed", "no-discount"),
        ("unpriced", "no-base-price"),
        ("transcorp", "deals-exhausted"),
    ];
    for (id, reason) in cases {
        let (status, body) = negotiate(&app, json!({"propertyId": id})).await;
        assert_eq!(status, StatusCode::OK, "{id}");
        assert_eq!(body, json!({"status": "no-offer", "reason": reason}), "{id}");
    }
}

#[tokio::test]
async fn test_negotiate_rejects_other_methods() {
    let (app, _) = test_app();
    let (status, _) = send(&app, Method::GET, "/api/negotiate", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_offer_token_verifies() {
    let (app, _) = test_app();
    let (_, offer) = negotiate(&app, json!({"propertyId": "eko"})).await;
    let token = offer["token"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/negotiate/verify",
        Some(json!({"token": token, "propertyId": "eko"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["offer"]["discountedTotal"], 148_000);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/negotiate/verify",
        Some(json!({"token": token, "propertyId": "ikoyi"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "mismatched-propertyId");

    let (_, body) = send(&app, Method::POST, "/api/negotiate/verify", Some(json!({}))).await;
    assert_eq!(body["reason"], "missing-token");
}

// ============================================================================
// Notifications
// ============================================================================

fn booking_job() -> Value {
    json!({
        "type": "email",
        "template": "booking_confirmation",
        "recipient": {"email": "a@b.com", "name": "A"},
        "data": {"bookingId": "BK1", "totalAmount": 100000},
        "maxAttempts": 3
    })
}

#[tokio::test]
async fn test_enqueue_and_fetch_job() {
    let (app, state) = test_app();

    let (status, body) = send(&app, Method::POST, "/api/notifications", Some(booking_job())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Notification queued successfully");
    let job_id = body["jobId"].as_str().unwrap().to_string();

    state.queue.process_queue().await.unwrap();

    let uri = format!("/api/notifications?jobId={job_id}");
    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job"]["id"], job_id.as_str());
    assert_eq!(body["job"]["status"], "sent");
    assert_eq!(body["job"]["attempts"], 1);
}

#[tokio::test]
async fn test_enqueue_validation_errors() {
    let (app, _) = test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/notifications",
        Some(json!({"template": "booking_confirmation"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields: template, recipient, data");

    let mut sms = booking_job();
    sms["type"] = json!("sms");
    let (status, body) = send(&app, Method::POST, "/api/notifications", Some(sms)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Phone number required for SMS notifications");

    let mut email = booking_job();
    email["recipient"] = json!({"phone": "+2347077775545", "name": "A"});
    let (status, body) = send(&app, Method::POST, "/api/notifications", Some(email)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email address required for email notifications");
}

#[tokio::test]
async fn test_enqueue_without_content_type() {
    let (app, state) = test_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/notifications")
        .body(Body::from(booking_job().to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let job_id = body["jobId"].as_str().unwrap();
    assert_eq!(state.queue.job(job_id).unwrap().template, "booking_confirmation");
}

#[tokio::test]
async fn test_enqueue_malformed_json_is_reported() {
    let (app, _) = test_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/notifications")
        .header("content-type", "application/json")
        .body(Body::from("{\"template\": \"booking_confirmation\","))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Request body must be valid JSON");
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_enqueue_accepts_schedule_without_offset() {
    let (app, state) = test_app();

    let mut job = booking_job();
    job["scheduledFor"] = json!("2030-01-01T10:00:00");
    let (status, body) = send(&app, Method::POST, "/api/notifications", Some(job)).await;
    assert_eq!(status, StatusCode::OK);

    let stored = state.queue.job(body["jobId"].as_str().unwrap()).unwrap();
    assert_eq!(stored.scheduled_for.unwrap().to_rfc3339(), "2030-01-01T10:00:00+00:00");

    let mut job = booking_job();
    job["scheduledFor"] = json!("whenever");
    let (status, body) = send(&app, Method::POST, "/api/notifications", Some(job)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("scheduledFor must be an ISO 8601 timestamp"));
}

#[tokio::test]
async fn test_bad_query_string_is_json_error() {
    let (app, _) = test_app();
    let (status, body) = send(&app, Method::GET, "/api/notifications?limit=abc", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"].as_str().unwrap().contains("limit"));
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let (app, _) = test_app();
    let (status, body) = send(&app, Method::GET, "/api/notifications?jobId=notif_missing", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Notification job not found");
}

#[tokio::test]
async fn test_list_jobs_with_filters() {
    let (app, state) = test_app();
    for _ in 0..3 {
        send(&app, Method::POST, "/api/notifications", Some(booking_job())).await;
    }

    let (status, body) = send(&app, Method::GET, "/api/notifications", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs"].as_array().unwrap().len(), 3);

    let (_, body) = send(&app, Method::GET, "/api/notifications?limit=2", None).await;
    assert_eq!(body["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(body["total"], 3);

    state.queue.process_queue().await.unwrap();
    let (_, body) = send(&app, Method::GET, "/api/notifications?status=pending", None).await;
    assert!(body["jobs"].as_array().unwrap().is_empty());

    let (status, _) = send(&app, Method::GET, "/api/notifications?status=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_retry_endpoint() {
    let (app, state) = test_app();

    // Unknown template: fails permanently on first pass
    let mut job = booking_job();
    job["template"] = json!("no_such_template");
    let (_, body) = send(&app, Method::POST, "/api/notifications", Some(job)).await;
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let uri = format!("/api/notifications/{job_id}/retry");
    let (status, _) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    state.queue.process_queue().await.unwrap();
    assert_eq!(state.queue.job(&job_id).unwrap().status.as_str(), "failed");

    let (status, body) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(state.queue.job(&job_id).unwrap().attempts, 0);

    let (status, _) = send(&app, Method::POST, "/api/notifications/notif_missing/retry", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_manual_process_endpoint() {
    let (app, _) = test_app();
    send(&app, Method::POST, "/api/notifications", Some(booking_job())).await;

    let (status, body) = send(&app, Method::POST, "/api/notifications/process", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], true);
    assert_eq!(body["summary"]["sent"], 1);
}

// ============================================================================
// Health & Metrics
// ============================================================================

#[tokio::test]
async fn test_health_reports_catalog_and_queue() {
    let (app, _) = test_app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["catalog"]["properties"], 5);
    assert_eq!(body["notifications"]["total"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = test_app();
    negotiate(&app, json!({"propertyId": "eko"})).await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("hotelsaver_negotiations_total"));
    assert!(text.contains("hotelsaver_notification_jobs"));
}
