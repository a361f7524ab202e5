use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use super::catalog::{Property, PropertyCatalog};
use super::token::{unix_seconds, OfferClaims, OfferSigner, TokenError};
use crate::config::NegotiationConfig;

/// Longest stay a single negotiation may price.
pub const MAX_NIGHTS: u32 = 365;

/// Request-level failures. None of these is ever retried.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("propertyId must be a non-empty string")]
    InvalidPropertyId,

    #[error("nights must be between 1 and 365")]
    InvalidNights,

    #[error("Property not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl NegotiationError {
    /// Machine-readable reason code used at the HTTP boundary
    pub fn reason(&self) -> &'static str {
        match self {
            NegotiationError::InvalidPropertyId => "invalid-propertyId",
            NegotiationError::InvalidNights => "invalid-nights",
            NegotiationError::NotFound(_) => "not-found",
            NegotiationError::Token(_) => "internal-error",
        }
    }
}

/// Why a known property produced no offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoOfferReason {
    /// The property has no usable base price
    NoBasePrice,
    /// Fixed pricing: no rate configured, or the rate does not move the price
    NoDiscount,
    /// Deals for the property's city are exhausted for today
    DealsExhausted,
}

impl NoOfferReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoOfferReason::NoBasePrice => "no-base-price",
            NoOfferReason::NoDiscount => "no-discount",
            NoOfferReason::DealsExhausted => "deals-exhausted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySummary {
    pub id: String,
    pub name: String,
    pub city: String,
}

impl From<&Property> for PropertySummary {
    fn from(p: &Property) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            city: p.city.clone(),
        }
    }
}

/// A time-boxed discounted price for one property.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountOffer {
    pub property_id: String,
    pub nights: u32,
    pub base_total: i64,
    pub discount_rate: f64,
    pub discounted_total: i64,
    pub savings: i64,
    pub expires_at: DateTime<Utc>,
    /// Signed copy of the price for checkout
    pub token: String,
    pub property: PropertySummary,
}

#[derive(Debug, Clone)]
pub enum NegotiationOutcome {
    Offer(DiscountOffer),
    NoOffer {
        reason: NoOfferReason,
        property: PropertySummary,
    },
}

/// Discounted total for `base_total` at `rate`, rounded half away from zero.
pub fn discounted_total(base_total: i64, rate: f64) -> i64 {
    (base_total as f64 * (1.0 - rate)).round() as i64
}

pub struct NegotiationEngine {
    catalog: Arc<dyn PropertyCatalog>,
    signer: OfferSigner,
    offer_ttl: Duration,
    exhausted_cities: Vec<String>,
}

impl NegotiationEngine {
    pub fn new(
        catalog: Arc<dyn PropertyCatalog>,
        signer: OfferSigner,
        config: &NegotiationConfig,
    ) -> Self {
        Self {
            catalog,
            signer,
            offer_ttl: Duration::seconds(config.offer_ttl_secs as i64),
            exhausted_cities: config
                .exhausted_cities
                .iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    pub fn offer_ttl(&self) -> Duration {
        self.offer_ttl
    }

    pub fn signer(&self) -> &OfferSigner {
        &self.signer
    }

    pub fn negotiate(&self, property_id: &str, nights: u32) -> Result<NegotiationOutcome, NegotiationError> {
        self.negotiate_at(property_id, nights, Utc::now())
    }

    /// Price `property_id` for `nights` as of `now`. Pure apart from signing.
    pub fn negotiate_at(
        &self,
        property_id: &str,
        nights: u32,
        now: DateTime<Utc>,
    ) -> Result<NegotiationOutcome, NegotiationError> {
        if property_id.trim().is_empty() {
            return Err(NegotiationError::InvalidPropertyId);
        }
        if nights == 0 || nights > MAX_NIGHTS {
            return Err(NegotiationError::InvalidNights);
        }

        let property = self
            .catalog
            .property(property_id)
            .ok_or_else(|| NegotiationError::NotFound(property_id.to_string()))?;
        let summary = PropertySummary::from(&property);

        let no_offer = |reason: NoOfferReason| -> Result<NegotiationOutcome, NegotiationError> {
            tracing::debug!(property_id = %property_id, reason = reason.as_str(), "No offer");
            Ok(NegotiationOutcome::NoOffer {
                reason,
                property: summary.clone(),
            })
        };

        if self.exhausted_cities.contains(&property.city.to_lowercase()) {
            return no_offer(NoOfferReason::DealsExhausted);
        }

        let base_total = match property.base_price().checked_mul(nights as i64) {
            Some(total) if total > 0 => total,
            _ => return no_offer(NoOfferReason::NoBasePrice),
        };

        let rate = match self.catalog.discount_rate(property_id) {
            Some(rate) if rate > 0.0 && rate < 1.0 => rate,
            _ => return no_offer(NoOfferReason::NoDiscount),
        };

        let discounted = discounted_total(base_total, rate);
        if discounted <= 0 || discounted >= base_total {
            return no_offer(NoOfferReason::NoDiscount);
        }

        let expires_at = now + self.offer_ttl;
        let token = self.signer.sign(&OfferClaims {
            property_id: property.id.clone(),
            base_total,
            discounted_total: discounted,
            discount_rate: rate,
            exp: unix_seconds(expires_at),
            iat: unix_seconds(now),
        })?;

        tracing::info!(
            property_id = %property.id,
            base_total = base_total,
            discounted_total = discounted,
            rate = rate,
            "Discount offer issued"
        );

        Ok(NegotiationOutcome::Offer(DiscountOffer {
            property_id: property.id,
            nights,
            base_total,
            discount_rate: rate,
            discounted_total: discounted,
            savings: base_total - discounted,
            expires_at,
            token,
            property: summary,
        }))
    }
}
