//! Timestamped price observations.

use crate::{Currency, Price, ProductId, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stock status reported by the retailer page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    #[default]
    Unknown,
}

impl Availability {
    pub fn as_str(self) -> &'static str {
        match self {
            Availability::InStock => "in_stock",
            Availability::OutOfStock => "out_of_stock",
            Availability::Unknown => "unknown",
        }
    }

    #[inline]
    pub fn is_known(self) -> bool {
        !matches!(self, Availability::Unknown)
    }
}

impl From<bool> for Availability {
    fn from(in_stock: bool) -> Self {
        if in_stock {
            Availability::InStock
        } else {
            Availability::OutOfStock
        }
    }
}

impl FromStr for Availability {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_stock" => Ok(Availability::InStock),
            "out_of_stock" => Ok(Availability::OutOfStock),
            "unknown" => Ok(Availability::Unknown),
            other => Err(ValidationError::UnknownAvailability(other.to_string())),
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Availability::InStock => "in stock",
            Availability::OutOfStock => "out of stock",
            Availability::Unknown => "unknown",
        })
    }
}

/// Row id assigned by the store on append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One price/availability reading for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub product: ProductId,
    pub product_name: String,
    pub category: String,
    pub observed_at: DateTime<Utc>,
    pub current_price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Price>,
    pub currency: Currency,
    pub availability: Availability,
    /// Provider payload this observation was normalized from.
    #[serde(default)]
    pub raw_payload: serde_json::Value,
}

impl PriceObservation {
    pub fn new(
        product: ProductId,
        product_name: impl Into<String>,
        observed_at: DateTime<Utc>,
        current_price: Price,
        currency: Currency,
    ) -> Self {
        Self {
            product,
            product_name: product_name.into(),
            category: crate::DEFAULT_CATEGORY.to_string(),
            observed_at,
            current_price,
            original_price: None,
            currency,
            availability: Availability::Unknown,
            raw_payload: serde_json::Value::Null,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_original_price(mut self, original_price: Option<Price>) -> Self {
        self.original_price = original_price;
        self
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    pub fn with_raw_payload(mut self, raw_payload: serde_json::Value) -> Self {
        self.raw_payload = raw_payload;
        self
    }

    /// Check invariants that the field types cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.product.retailer.trim().is_empty() {
            return Err(ValidationError::EmptyField("retailer"));
        }
        if self.product.url.trim().is_empty() {
            return Err(ValidationError::EmptyField("url"));
        }
        for price in std::iter::once(self.current_price).chain(self.original_price) {
            if price.raw() > Price::MAX_RAW {
                return Err(ValidationError::PriceOutOfRange(price.to_f64()));
            }
        }
        Ok(())
    }

    /// Discount against the list price, in percent.
    pub fn discount_pct(&self) -> Option<f64> {
        let original = self.original_price?;
        if original <= self.current_price {
            return None;
        }
        Price::change_pct(original, self.current_price).map(f64::abs)
    }
}

/// An observation as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObservation {
    pub id: RecordId,
    #[serde(flatten)]
    pub observation: PriceObservation,
}

impl StoredObservation {
    /// Storage order: timestamp first, record id breaks ties.
    pub fn is_newer_than(&self, other: &StoredObservation) -> bool {
        (self.observation.observed_at, self.id) > (other.observation.observed_at, other.id)
    }
}

impl std::ops::Deref for StoredObservation {
    type Target = PriceObservation;

    fn deref(&self) -> &Self::Target {
        &self.observation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(price: f64) -> PriceObservation {
        PriceObservation::new(
            ProductId::new("Amazon", "https://amazon.com/dp/1").unwrap(),
            "Powerbeats Pro 2",
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            Price::from_f64(price).unwrap(),
            Currency::USD,
        )
    }

    #[test]
    fn test_availability_round_trip_str() {
        for a in [Availability::InStock, Availability::OutOfStock, Availability::Unknown] {
            assert_eq!(a.as_str().parse::<Availability>().unwrap(), a);
        }
        assert!("maybe".parse::<Availability>().is_err());
        assert_eq!(Availability::from(false), Availability::OutOfStock);
    }

    #[test]
    fn test_observation_defaults() {
        let obs = sample(249.0);
        assert_eq!(obs.availability, Availability::Unknown);
        assert_eq!(obs.category, "general");
        assert!(obs.validate().is_ok());
    }

    #[test]
    fn test_discount_pct() {
        let obs = sample(200.0).with_original_price(Some(Price::from_f64(250.0).unwrap()));
        assert_eq!(obs.discount_pct(), Some(20.0));

        let no_discount = sample(250.0).with_original_price(Some(Price::from_f64(250.0).unwrap()));
        assert_eq!(no_discount.discount_pct(), None);
        assert_eq!(sample(250.0).discount_pct(), None);
    }

    #[test]
    fn test_tie_break_by_record_id() {
        let a = StoredObservation { id: RecordId(1), observation: sample(10.0) };
        let b = StoredObservation { id: RecordId(2), observation: sample(11.0) };
        assert!(b.is_newer_than(&a));
        assert!(!a.is_newer_than(&b));

        let mut later = sample(9.0);
        later.observed_at = later.observed_at + chrono::Duration::seconds(1);
        let c = StoredObservation { id: RecordId(0), observation: later };
        assert!(c.is_newer_than(&b));
    }
}
