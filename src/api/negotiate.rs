//! Negotiation endpoints.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metrics::NegotiationMetrics;
use crate::negotiation::{DiscountOffer, NegotiationError, NegotiationOutcome, OfferClaims, TokenError};
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum NegotiateResponse {
    Discount(DiscountOffer),
    NoOffer { reason: &'static str },
}

/// A negotiation request that ended before pricing.
#[derive(Debug)]
pub struct NegotiateRejection {
    status: StatusCode,
    reason: &'static str,
}

impl NegotiateRejection {
    fn new(status: StatusCode, reason: &'static str) -> Self {
        Self { status, reason }
    }
}

impl From<NegotiationError> for NegotiateRejection {
    fn from(err: NegotiationError) -> Self {
        let status = match &err {
            NegotiationError::InvalidPropertyId | NegotiationError::InvalidNights => {
                StatusCode::BAD_REQUEST
            }
            NegotiationError::NotFound(_) => StatusCode::NOT_FOUND,
            NegotiationError::Token(e) => {
                tracing::error!(error = %e, "Failed to sign offer token");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.reason())
    }
}

impl IntoResponse for NegotiateRejection {
    fn into_response(self) -> Response {
        NegotiationMetrics::record_outcome(self.reason);
        let body = NegotiateResponse::NoOffer { reason: self.reason };
        (self.status, Json(body)).into_response()
    }
}

/// Pull `propertyId` and `nights` out of a raw JSON body.
fn parse_request(body: &[u8]) -> Result<(String, u32), NegotiateRejection> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| NegotiateRejection::new(StatusCode::BAD_REQUEST, "bad-request"))?;

    let property_id = value
        .get("propertyId")
        .and_then(Value::as_str)
        .ok_or(NegotiationError::InvalidPropertyId)?;

    let nights = match value.get("nights") {
        None | Some(Value::Null) => 1,
        Some(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or(NegotiationError::InvalidNights)?,
    };

    Ok((property_id.to_string(), nights))
}

/// POST /api/negotiate
#[tracing::instrument(skip_all, fields(property_id))]
pub async fn negotiate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<NegotiateResponse>, NegotiateRejection> {
    let (property_id, nights) = parse_request(&body)?;
    tracing::Span::current().record("property_id", property_id.as_str());

    match state.engine.negotiate(&property_id, nights)? {
        NegotiationOutcome::Offer(offer) => {
            NegotiationMetrics::record_outcome("discount");
            tracing::info!(
                property_id = %offer.property_id,
                base_total = offer.base_total,
                discounted_total = offer.discounted_total,
                "Offer issued"
            );
            Ok(Json(NegotiateResponse::Discount(offer)))
        }
        NegotiationOutcome::NoOffer { reason, .. } => {
            NegotiationMetrics::record_outcome(reason.as_str());
            Ok(Json(NegotiateResponse::NoOffer {
                reason: reason.as_str(),
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub property_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer: Option<OfferClaims>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// POST /api/negotiate/verify
#[tracing::instrument(skip_all)]
pub async fn verify_offer(State(state): State<AppState>, body: Bytes) -> Response {
    let request: VerifyRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => return invalid(TokenError::MalformedToken.reason()),
    };

    let token = request.token.as_deref().map(str::trim).unwrap_or_default();
    if token.is_empty() {
        return invalid(TokenError::MissingToken.reason());
    }

    match state
        .engine
        .signer()
        .verify(token, request.property_id.as_deref())
    {
        Ok(claims) => Json(VerifyResponse {
            valid: true,
            offer: Some(claims),
            reason: None,
        })
        .into_response(),
        Err(e) => {
            tracing::debug!(reason = e.reason(), "Offer token rejected");
            invalid(e.reason())
        }
    }
}

fn invalid(reason: &'static str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(VerifyResponse {
            valid: false,
            offer: None,
            reason: Some(reason),
        }),
    )
        .into_response()
}
