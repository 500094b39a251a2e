//! Change detector.
//!
//! Loads the two most recent observations of a product and computes the
//! difference between them.

use pricewatch_core::{Availability, Currency, Price, ProductId, StoredObservation};
use pricewatch_store::{LatestPair, PriceStore, StorageError};
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeltaError {
    #[error("Cannot compare {older} with {newer}: currencies differ")]
    CurrencyMismatch { older: Currency, newer: Currency },
    #[error("Cannot compare observations of different products: {0} vs {1}")]
    ProductMismatch(ProductId, ProductId),
}

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Delta(#[from] DeltaError),
}

/// Stock status flip between two observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AvailabilityTransition {
    pub from: Availability,
    pub to: Availability,
}

impl AvailabilityTransition {
    /// Only a change between two known states counts as a transition.
    pub fn between(older: Availability, newer: Availability) -> Option<Self> {
        if older.is_known() && newer.is_known() && older != newer {
            Some(Self { from: older, to: newer })
        } else {
            None
        }
    }

    pub fn is_restock(&self) -> bool {
        self.to == Availability::InStock
    }
}

/// Difference between two consecutive observations of one product.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceDelta {
    pub newer: StoredObservation,
    pub older: StoredObservation,
    /// `new - old` in currency units
    pub difference: f64,
    /// `(new - old) / old * 100`, `None` when the older price is zero
    pub pct_change: Option<f64>,
    pub availability: Option<AvailabilityTransition>,
}

impl PriceDelta {
    /// Compare two observations of the same product. Arguments given in the
    /// wrong order are swapped so that `newer` is always the later record.
    pub fn between(
        newer: StoredObservation,
        older: StoredObservation,
    ) -> Result<Self, DeltaError> {
        let (newer, older) = if older.is_newer_than(&newer) {
            (older, newer)
        } else {
            (newer, older)
        };

        if newer.product != older.product {
            return Err(DeltaError::ProductMismatch(
                older.product.clone(),
                newer.product.clone(),
            ));
        }
        if newer.currency != older.currency {
            return Err(DeltaError::CurrencyMismatch {
                older: older.currency,
                newer: newer.currency,
            });
        }

        let old_price = older.current_price;
        let new_price = newer.current_price;
        let difference = Price::diff_raw(old_price, new_price) as f64 / Price::SCALE as f64;
        let pct_change = Price::change_pct(old_price, new_price);
        let availability = AvailabilityTransition::between(older.availability, newer.availability);

        Ok(Self {
            newer,
            older,
            difference,
            pct_change,
            availability,
        })
    }

    #[inline]
    pub fn old_price(&self) -> Price {
        self.older.current_price
    }

    #[inline]
    pub fn new_price(&self) -> Price {
        self.newer.current_price
    }

    /// Ordering of the new price relative to the old one.
    pub fn direction(&self) -> Ordering {
        self.new_price().cmp(&self.old_price())
    }

    pub fn is_unchanged(&self) -> bool {
        self.direction() == Ordering::Equal && self.availability.is_none()
    }
}

/// Outcome of comparing a product's latest observation with its baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Delta(PriceDelta),
    /// Fewer than two observations exist; the first one has no baseline.
    NoPriorData,
}

impl Detection {
    /// Build a detection from the store's two most recent rows.
    pub fn from_pair(pair: LatestPair) -> Result<Self, DeltaError> {
        match (pair.latest, pair.previous) {
            (Some(latest), Some(previous)) => PriceDelta::between(latest, previous).map(Detection::Delta),
            _ => Ok(Detection::NoPriorData),
        }
    }

    pub fn delta(&self) -> Option<&PriceDelta> {
        match self {
            Detection::Delta(delta) => Some(delta),
            Detection::NoPriorData => None,
        }
    }
}

/// Change detector over an explicitly passed store handle.
pub struct ChangeDetector<'a> {
    store: &'a PriceStore,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(store: &'a PriceStore) -> Self {
        Self { store }
    }

    /// Compare the newest observation of `product` with the one before it.
    pub async fn detect(&self, product: &ProductId) -> Result<Detection, DetectError> {
        let pair = self.store.latest_two(product).await?;
        let detection = Detection::from_pair(pair)?;

        match &detection {
            Detection::Delta(delta) => debug!(
                product = %product,
                old = %delta.old_price(),
                new = %delta.new_price(),
                pct = ?delta.pct_change,
                "Computed price delta"
            ),
            Detection::NoPriorData => debug!(product = %product, "No prior observation"),
        }
        Ok(detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pricewatch_core::{PriceObservation, RecordId};
    use pretty_assertions::assert_eq;

    fn product() -> ProductId {
        ProductId::new("Best Buy", "https://bestbuy.com/site/6577331").unwrap()
    }

    fn stored(id: i64, hour: u32, price: f64, availability: Availability) -> StoredObservation {
        StoredObservation {
            id: RecordId(id),
            observation: PriceObservation::new(
                product(),
                "Powerbeats Pro 2",
                Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap(),
                Price::from_f64(price).unwrap(),
                Currency::USD,
            )
            .with_availability(availability),
        }
    }

    #[test]
    fn test_delta_price_drop() {
        let older = stored(1, 1, 100.0, Availability::InStock);
        let newer = stored(2, 2, 90.0, Availability::InStock);
        let delta = PriceDelta::between(newer, older).unwrap();

        assert_eq!(delta.difference, -10.0);
        assert_eq!(delta.pct_change, Some(-10.0));
        assert_eq!(delta.availability, None);
        assert_eq!(delta.direction(), Ordering::Less);
    }

    #[test]
    fn test_delta_swaps_misordered_arguments() {
        let older = stored(1, 1, 100.0, Availability::InStock);
        let newer = stored(2, 2, 120.0, Availability::InStock);
        let delta = PriceDelta::between(older, newer).unwrap();

        assert_eq!(delta.newer.id, RecordId(2));
        assert_eq!(delta.pct_change, Some(20.0));
    }

    #[test]
    fn test_delta_zero_base_has_no_pct() {
        let older = stored(1, 1, 0.0, Availability::InStock);
        let newer = stored(2, 2, 15.0, Availability::OutOfStock);
        let delta = PriceDelta::between(newer, older).unwrap();

        assert_eq!(delta.pct_change, None);
        assert_eq!(delta.difference, 15.0);
        assert_eq!(
            delta.availability,
            Some(AvailabilityTransition {
                from: Availability::InStock,
                to: Availability::OutOfStock,
            })
        );
    }

    #[test]
    fn test_delta_rejects_currency_mismatch() {
        let older = stored(1, 1, 100.0, Availability::InStock);
        let mut newer = stored(2, 2, 90.0, Availability::InStock);
        newer.observation.currency = Currency::EUR;

        assert_eq!(
            PriceDelta::between(newer, older),
            Err(DeltaError::CurrencyMismatch {
                older: Currency::USD,
                newer: Currency::EUR,
            })
        );
    }

    #[test]
    fn test_delta_rejects_other_product() {
        let older = stored(1, 1, 100.0, Availability::InStock);
        let mut newer = stored(2, 2, 90.0, Availability::InStock);
        newer.observation.product = ProductId::new("Walmart", "https://walmart.com/ip/1").unwrap();

        assert!(matches!(
            PriceDelta::between(newer, older),
            Err(DeltaError::ProductMismatch(..))
        ));
    }

    #[test]
    fn test_unknown_availability_is_not_a_transition() {
        assert_eq!(
            AvailabilityTransition::between(Availability::Unknown, Availability::OutOfStock),
            None
        );
        assert_eq!(
            AvailabilityTransition::between(Availability::InStock, Availability::Unknown),
            None
        );
        let restock =
            AvailabilityTransition::between(Availability::OutOfStock, Availability::InStock)
                .unwrap();
        assert!(restock.is_restock());
    }

    #[test]
    fn test_detection_from_pair() {
        assert_eq!(
            Detection::from_pair(LatestPair::default()).unwrap(),
            Detection::NoPriorData
        );

        let only = LatestPair {
            latest: Some(stored(1, 1, 10.0, Availability::InStock)),
            previous: None,
        };
        assert_eq!(Detection::from_pair(only).unwrap(), Detection::NoPriorData);
    }

    #[tokio::test]
    async fn test_detect_against_store() {
        let store = PriceStore::connect("sqlite::memory:").await.unwrap();
        let detector = ChangeDetector::new(&store);
        let id = product();

        let first = stored(0, 1, 100.0, Availability::InStock).observation;
        store.record(&first).await.unwrap();
        assert_eq!(detector.detect(&id).await.unwrap(), Detection::NoPriorData);

        let second = stored(0, 2, 90.0, Availability::InStock).observation;
        store.record(&second).await.unwrap();
        let detection = detector.detect(&id).await.unwrap();
        let delta = detection.delta().unwrap();
        assert_eq!(delta.pct_change, Some(-10.0));
        assert_eq!(delta.older.current_price, first.current_price);
    }

    #[tokio::test]
    async fn test_detect_same_timestamp_uses_record_id() {
        let store = PriceStore::connect("sqlite::memory:").await.unwrap();
        let detector = ChangeDetector::new(&store);

        store
            .record(&stored(0, 5, 100.0, Availability::InStock).observation)
            .await
            .unwrap();
        store
            .record(&stored(0, 5, 80.0, Availability::InStock).observation)
            .await
            .unwrap();

        let detection = detector.detect(&product()).await.unwrap();
        assert_eq!(detection.delta().unwrap().new_price(), Price::from_f64(80.0).unwrap());
    }

    #[tokio::test]
    async fn test_detect_reports_currency_mismatch() {
        let store = PriceStore::connect("sqlite::memory:").await.unwrap();
        let detector = ChangeDetector::new(&store);

        store
            .record(&stored(0, 1, 100.0, Availability::InStock).observation)
            .await
            .unwrap();
        let mut euro = stored(0, 2, 90.0, Availability::InStock).observation;
        euro.currency = Currency::EUR;
        store.record(&euro).await.unwrap();

        let err = detector.detect(&product()).await.unwrap_err();
        assert!(matches!(
            err,
            DetectError::Delta(DeltaError::CurrencyMismatch { .. })
        ));
    }
}
