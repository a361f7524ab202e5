//! HS256-signed offer tokens.
//!
//! A token carries the negotiated price so checkout can trust it without
//! re-running the negotiation. It expires together with the offer.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{is_production, NegotiationConfig};

const DEV_FALLBACK_SECRET: &str = "dev-only-secret-change-in-prod";

/// Why a token was rejected. `reason()` gives the wire code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Offer token is missing")]
    MissingToken,

    #[error("Offer token is malformed")]
    MalformedToken,

    #[error("Offer token signature does not match")]
    BadSignature,

    #[error("Offer token has expired")]
    Expired,

    #[error("Offer token payload is invalid")]
    InvalidPayload,

    #[error("Offer token was issued for property {expected}, not {actual}")]
    MismatchedProperty { expected: String, actual: String },

    #[error("Failed to sign offer token: {0}")]
    Signing(String),

    #[error("negotiation.token_secret is required in production")]
    MissingSecret,
}

impl TokenError {
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::MissingToken => "missing-token",
            TokenError::MalformedToken => "malformed-token",
            TokenError::BadSignature => "bad-signature",
            TokenError::Expired => "expired",
            TokenError::InvalidPayload => "invalid-payload",
            TokenError::MismatchedProperty { .. } => "mismatched-propertyId",
            TokenError::Signing(_) => "signing-failed",
            TokenError::MissingSecret => "missing-secret",
        }
    }
}

/// Claims embedded in an offer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferClaims {
    pub property_id: String,
    pub base_total: i64,
    pub discounted_total: i64,
    pub discount_rate: f64,
    /// Expiry (Unix timestamp, seconds)
    pub exp: i64,
    /// Issued at (Unix timestamp, seconds)
    pub iat: i64,
}

impl OfferClaims {
    fn is_consistent(&self) -> bool {
        !self.property_id.is_empty()
            && self.discounted_total > 0
            && self.discounted_total < self.base_total
    }
}

pub struct OfferSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl OfferSigner {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Build a signer from configuration. Without a configured secret the
    /// development fallback is used, except in production.
    pub fn from_config(config: &NegotiationConfig) -> Result<Self, TokenError> {
        match config.token_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(Self::new(secret)),
            _ if is_production() => Err(TokenError::MissingSecret),
            _ => {
                tracing::warn!("negotiation.token_secret not set, using development secret");
                Ok(Self::new(DEV_FALLBACK_SECRET))
            }
        }
    }

    pub fn sign(&self, claims: &OfferClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token and, when given, that it was issued for `property_id`.
    pub fn verify(&self, token: &str, property_id: Option<&str>) -> Result<OfferClaims, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::MissingToken);
        }
        if token.split('.').count() != 3 {
            return Err(TokenError::MalformedToken);
        }

        let data = decode::<OfferClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Utf8(_) => {
                    TokenError::MalformedToken
                }
                _ => TokenError::InvalidPayload,
            },
        )?;

        let claims = data.claims;
        if !claims.is_consistent() {
            return Err(TokenError::InvalidPayload);
        }

        if let Some(expected) = property_id {
            if expected != claims.property_id {
                return Err(TokenError::MismatchedProperty {
                    expected: expected.to_string(),
                    actual: claims.property_id,
                });
            }
        }

        Ok(claims)
    }
}

/// Seconds since the epoch for a token `exp`/`iat` claim.
pub fn unix_seconds(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}
