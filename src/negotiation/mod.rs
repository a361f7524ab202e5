//! Negotiated discount offers.
//!
//! Given a property id the engine looks up the property's base price and
//! configured discount rate, and returns a signed offer that stays valid for
//! a fixed TTL. The result is a pure function of the property tables and the
//! current time.

mod catalog;
mod engine;
mod token;

pub use catalog::{CatalogError, Property, PropertyCatalog, StaticCatalog};
pub use engine::{
    discounted_total, DiscountOffer, NegotiationEngine, NegotiationError, NegotiationOutcome,
    NoOfferReason, PropertySummary, MAX_NIGHTS,
};
pub use token::{OfferClaims, OfferSigner, TokenError};
