//! Outbound email and SMS transports.
//!
//! The queue only sees these traits; the actual provider (SMTP relay,
//! SMS gateway) plugs in behind them.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use super::types::DeliveryError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// `"Name" <address>` sender line
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError>;
}

#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send(&self, message: &SmsMessage) -> Result<(), DeliveryError>;
}

/// Writes outgoing email to the log instead of a mail server.
#[derive(Debug, Default, Clone)]
pub struct LogEmailTransport;

#[async_trait]
impl EmailTransport for LogEmailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        tracing::info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            bytes = message.html.len(),
            "Email delivered to log transport"
        );
        Ok(())
    }
}

/// Posts email to a transactional mail relay over HTTP.
pub struct HttpEmailTransport {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl HttpEmailTransport {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        let payload = EmailPayload {
            from: &message.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
        };

        let mut request = self.client.post(&self.api_url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, to = %message.to, "Email relay unreachable");
            DeliveryError::transient(format!("Email relay connection error: {e}"))
        })?;

        let status = res.status();
        if status.is_success() {
            tracing::debug!(to = %message.to, %status, "Email accepted by relay");
            return Ok(());
        }

        let text = res.text().await.unwrap_or_default();
        tracing::warn!(to = %message.to, %status, body = %text, "Email relay rejected message");
        Err(relay_error(status, &text))
    }
}

/// Rejected recipients or payloads will fail again; throttling and server
/// faults may not.
fn relay_error(status: StatusCode, body: &str) -> DeliveryError {
    let message = format!("Email relay returned {status}: {body}");
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            DeliveryError::transient(message)
        }
        s if s.is_client_error() => DeliveryError::permanent(message),
        _ => DeliveryError::transient(message),
    }
}

/// Writes outgoing SMS to the log instead of an SMS gateway.
#[derive(Debug, Default, Clone)]
pub struct LogSmsTransport;

#[async_trait]
impl SmsTransport for LogSmsTransport {
    async fn send(&self, message: &SmsMessage) -> Result<(), DeliveryError> {
        tracing::info!(to = %message.to, body = %message.body, "SMS delivered to log transport");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::Value;
    use tokio::net::TcpListener;

    fn email() -> EmailMessage {
        EmailMessage {
            from: "\"HotelSaver.ng\" <noreply@hotelsaver.ng>".into(),
            to: "guest@example.com".into(),
            subject: "Booking Confirmation".into(),
            html: "<p>Hi</p>".into(),
        }
    }

    /// Serve a one-route relay that answers every POST with `status`.
    async fn relay(status: StatusCode) -> String {
        let app = Router::new().route(
            "/send",
            post(move |headers: HeaderMap, Json(body): Json<Value>| async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer relay-key");
                if !authorized || body["to"] != "guest@example.com" {
                    return StatusCode::UNAUTHORIZED;
                }
                status
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/send")
    }

    #[tokio::test]
    async fn test_http_email_accepted() {
        let url = relay(StatusCode::ACCEPTED).await;
        let transport = HttpEmailTransport::new(url, Some("relay-key".into()));
        assert!(transport.send(&email()).await.is_ok());
    }

    #[tokio::test]
    async fn test_http_email_server_error_is_transient() {
        let url = relay(StatusCode::BAD_GATEWAY).await;
        let transport = HttpEmailTransport::new(url, Some("relay-key".into()));
        let err = transport.send(&email()).await.unwrap_err();
        assert!(!err.is_permanent());
        assert!(err.message.contains("502"));
    }

    #[tokio::test]
    async fn test_http_email_rejected_address_is_permanent() {
        let url = relay(StatusCode::UNPROCESSABLE_ENTITY).await;
        let transport = HttpEmailTransport::new(url, Some("relay-key".into()));
        let err = transport.send(&email()).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_http_email_unreachable_is_transient() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpEmailTransport::new(format!("http://{addr}/send"), None);
        let err = transport.send(&email()).await.unwrap_err();
        assert!(!err.is_permanent());
    }

    #[test]
    fn test_relay_error_classification() {
        assert!(!relay_error(StatusCode::TOO_MANY_REQUESTS, "").is_permanent());
        assert!(!relay_error(StatusCode::SERVICE_UNAVAILABLE, "").is_permanent());
        assert!(relay_error(StatusCode::BAD_REQUEST, "bad address").is_permanent());
    }

    #[tokio::test]
    async fn test_log_transports_succeed() {
        assert!(LogEmailTransport.send(&email()).await.is_ok());

        let sms = SmsMessage {
            to: "+2347077775545".into(),
            body: "Hi".into(),
        };
        assert!(LogSmsTransport.send(&sms).await.is_ok());
    }
}
