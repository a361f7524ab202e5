//! Read-only property and discount-rate tables.
//!
//! The negotiation engine never decides how large a discount is; it reads the
//! rate from whatever [`PropertyCatalog`] it was built with.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A bookable property with its nightly base price in naira.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(rename = "basePriceNGN", default, skip_serializing_if = "Option::is_none")]
    pub base_price_ngn: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
}

impl Property {
    /// Nightly base price: `basePriceNGN` when present, else `price`, else 0.
    pub fn base_price(&self) -> i64 {
        self.base_price_ngn.or(self.price).unwrap_or(0)
    }
}

/// Source of properties and their configured discount rates.
pub trait PropertyCatalog: Send + Sync {
    fn property(&self, id: &str) -> Option<Property>;

    /// Discount rate in `(0, 1)` for a known property; `None` or `Some(0.0)`
    /// means the property has fixed pricing.
    fn discount_rate(&self, id: &str) -> Option<f64>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory catalog loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    properties: HashMap<String, Property>,
    overrides: HashMap<String, f64>,
    default_rate: Option<f64>,
}

fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0 && rate < 1.0
}

impl StaticCatalog {
    pub fn new(
        properties: impl IntoIterator<Item = Property>,
        overrides: HashMap<String, f64>,
        default_rate: Option<f64>,
    ) -> Self {
        let default_rate = default_rate.filter(|r| is_valid_rate(*r));
        Self {
            properties: properties.into_iter().map(|p| (p.id.clone(), p)).collect(),
            overrides,
            default_rate,
        }
    }

    /// Load the catalog from a JSON array of properties and a JSON object of
    /// `{ "<propertyId>": rate }` overrides. Missing files yield empty tables.
    pub fn load(
        properties_path: Option<&str>,
        discounts_path: Option<&str>,
        default_rate: Option<f64>,
    ) -> Result<Self, CatalogError> {
        let properties: Vec<Property> = read_json_or_default(properties_path)?;
        let overrides: HashMap<String, f64> = read_json_or_default(discounts_path)?;

        tracing::info!(
            properties = properties.len(),
            overrides = overrides.len(),
            default_rate = ?default_rate,
            "Property catalog loaded"
        );

        Ok(Self::new(properties, overrides, default_rate))
    }

    pub fn has_override(&self, id: &str) -> bool {
        self.overrides.contains_key(id)
    }
}

fn read_json_or_default<T>(path: Option<&str>) -> Result<T, CatalogError>
where
    T: serde::de::DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };

    if !Path::new(path).exists() {
        tracing::warn!(path = %path, "Catalog file not found, using empty table");
        return Ok(T::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_string(),
        source,
    })?;

    serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
        path: path.to_string(),
        source,
    })
}

impl PropertyCatalog for StaticCatalog {
    fn property(&self, id: &str) -> Option<Property> {
        self.properties.get(id).cloned()
    }

    fn discount_rate(&self, id: &str) -> Option<f64> {
        match self.overrides.get(id) {
            // Explicit zero marks fixed pricing
            Some(rate) if *rate == 0.0 => Some(0.0),
            Some(rate) if is_valid_rate(*rate) => Some(*rate),
            Some(rate) => {
                tracing::warn!(property_id = %id, rate = %rate, "Ignoring out-of-range discount override");
                self.default_rate
            }
            None => self.default_rate,
        }
    }

    fn len(&self) -> usize {
        self.properties.len()
    }
}
