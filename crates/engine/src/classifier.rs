//! Alert classification and per-run deduplication.

use crate::{Alert, PriceDelta, PriceDirection, Severity};
use chrono::{DateTime, Utc};
use pricewatch_core::ProductId;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

/// Default minimum percentage move that triggers an alert.
pub const DEFAULT_THRESHOLD_PCT: f64 = 5.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThresholdError {
    #[error("alert threshold must be greater than zero, got {0}")]
    NotPositive(f64),
    #[error("alert threshold must be a finite number")]
    NotFinite,
}

/// Validated run-wide alert threshold, in percent.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct AlertThreshold(f64);

impl AlertThreshold {
    pub fn new(pct: f64) -> Result<Self, ThresholdError> {
        if !pct.is_finite() {
            return Err(ThresholdError::NotFinite);
        }
        if pct <= 0.0 {
            return Err(ThresholdError::NotPositive(pct));
        }
        Ok(Self(pct))
    }

    #[inline]
    pub fn pct(self) -> f64 {
        self.0
    }

    /// Inclusive: a move of exactly the threshold qualifies.
    #[inline]
    pub fn is_met_by(self, pct_change: f64) -> bool {
        pct_change.abs() >= self.0
    }
}

impl Default for AlertThreshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD_PCT)
    }
}

/// Classify a delta, stamping the alert with the current time.
pub fn classify(delta: &PriceDelta, threshold: AlertThreshold) -> Option<Alert> {
    classify_at(delta, threshold, Utc::now())
}

/// Classify a delta against `threshold`.
///
/// Returns `None` when the price moved by less than the threshold and the
/// availability did not flip. A zero baseline price has no percentage
/// change, so only the availability can raise an alert in that case.
pub fn classify_at(
    delta: &PriceDelta,
    threshold: AlertThreshold,
    now: DateTime<Utc>,
) -> Option<Alert> {
    let qualifying_pct = delta.pct_change.filter(|&pct| threshold.is_met_by(pct));
    let price_direction = qualifying_pct.and_then(|_| match delta.direction() {
        Ordering::Less => Some(PriceDirection::Drop),
        Ordering::Greater => Some(PriceDirection::Increase),
        Ordering::Equal => None,
    });
    let availability = delta.availability;

    if price_direction.is_none() && availability.is_none() {
        return None;
    }

    let price_severity = price_direction
        .and(qualifying_pct)
        .map(|pct| Severity::for_price_move(pct.abs(), threshold.pct()));
    let stock_severity = availability.map(|_| Severity::Significant);
    let severity = price_severity.max(stock_severity)?;

    Some(Alert {
        product: delta.newer.product.clone(),
        product_name: delta.newer.product_name.clone(),
        kind: Alert::derived_kind(price_direction, availability),
        severity,
        currency: delta.newer.currency,
        old_price: delta.old_price(),
        new_price: delta.new_price(),
        pct_change: delta.pct_change,
        price_direction,
        availability,
        generated_at: now,
    })
}

/// Alerts collected during one run, at most one per product.
#[derive(Debug, Default)]
pub struct AlertBatch {
    alerts: Vec<Alert>,
    index: HashMap<ProductId, usize>,
}

impl AlertBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an alert. A second alert for the same product is merged into the
    /// first; returns `false` in that case.
    pub fn push(&mut self, alert: Alert) -> bool {
        match self.index.get(&alert.product) {
            Some(&slot) => {
                self.alerts[slot].merge(alert);
                false
            }
            None => {
                self.index.insert(alert.product.clone(), self.alerts.len());
                self.alerts.push(alert);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn into_alerts(self) -> Vec<Alert> {
        self.alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AlertKind, AvailabilityTransition};
    use chrono::TimeZone;
    use pricewatch_core::{
        Availability, Currency, Price, PriceObservation, RecordId, StoredObservation,
    };
    use pretty_assertions::assert_eq;

    fn product() -> ProductId {
        ProductId::new("Walmart", "https://walmart.com/ip/14781212").unwrap()
    }

    fn stored(id: i64, price: f64, availability: Availability) -> StoredObservation {
        StoredObservation {
            id: RecordId(id),
            observation: PriceObservation::new(
                product(),
                "Powerbeats Pro 2",
                Utc.with_ymd_and_hms(2025, 3, id as u32, 6, 0, 0).unwrap(),
                Price::from_f64(price).unwrap(),
                Currency::USD,
            )
            .with_availability(availability),
        }
    }

    fn delta(old: (f64, Availability), new: (f64, Availability)) -> PriceDelta {
        PriceDelta::between(stored(2, new.0, new.1), stored(1, old.0, old.1)).unwrap()
    }

    fn threshold(pct: f64) -> AlertThreshold {
        AlertThreshold::new(pct).unwrap()
    }

    #[test]
    fn test_threshold_rejects_non_positive() {
        assert_eq!(AlertThreshold::new(0.0), Err(ThresholdError::NotPositive(0.0)));
        assert_eq!(AlertThreshold::new(-2.5), Err(ThresholdError::NotPositive(-2.5)));
        assert_eq!(AlertThreshold::new(f64::NAN), Err(ThresholdError::NotFinite));
        assert_eq!(AlertThreshold::default().pct(), 5.0);
    }

    #[test]
    fn test_price_drop_scenario() {
        let d = delta((100.0, Availability::InStock), (90.0, Availability::InStock));
        let alert = classify(&d, threshold(5.0)).unwrap();

        assert_eq!(alert.kind, AlertKind::PriceDrop);
        assert_eq!(alert.pct_change, Some(-10.0));
        assert_eq!(alert.price_direction, Some(PriceDirection::Drop));
        assert_eq!(alert.severity, Severity::Significant);
        assert_eq!(alert.availability, None);
    }

    #[test]
    fn test_price_increase() {
        let d = delta((100.0, Availability::InStock), (130.0, Availability::InStock));
        let alert = classify(&d, threshold(5.0)).unwrap();
        assert_eq!(alert.kind, AlertKind::PriceIncrease);
        assert_eq!(alert.severity, Severity::Critical);
    }

    #[test]
    fn test_stock_change_scenario() {
        let d = delta((100.0, Availability::InStock), (100.0, Availability::OutOfStock));
        let alert = classify(&d, threshold(5.0)).unwrap();

        assert_eq!(alert.kind, AlertKind::StockChange);
        assert_eq!(alert.price_direction, None);
        assert_eq!(alert.severity, Severity::Significant);
    }

    #[test]
    fn test_small_move_without_stock_flip_is_silent() {
        let d = delta((100.0, Availability::InStock), (98.0, Availability::InStock));
        assert_eq!(classify(&d, threshold(5.0)), None);

        let unchanged = delta((100.0, Availability::InStock), (100.0, Availability::InStock));
        assert!(unchanged.is_unchanged());
        assert_eq!(classify(&unchanged, threshold(5.0)), None);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let d = delta((100.0, Availability::InStock), (95.0, Availability::InStock));
        assert_eq!(d.pct_change, Some(-5.0));

        let at_boundary = classify(&d, threshold(5.0)).unwrap();
        assert_eq!(at_boundary.kind, AlertKind::PriceDrop);
        assert_eq!(at_boundary.severity, Severity::Notice);

        assert_eq!(classify(&d, threshold(5.0 + 1e-9)), None);

        let just_under = delta((100.0, Availability::InStock), (95.01, Availability::InStock));
        assert_eq!(classify(&just_under, threshold(5.0)), None);
    }

    #[test]
    fn test_zero_baseline_falls_back_to_availability() {
        let silent = delta((0.0, Availability::InStock), (50.0, Availability::InStock));
        assert_eq!(silent.pct_change, None);
        assert_eq!(classify(&silent, threshold(5.0)), None);

        let flipped = delta((0.0, Availability::OutOfStock), (50.0, Availability::InStock));
        let alert = classify(&flipped, threshold(5.0)).unwrap();
        assert_eq!(alert.kind, AlertKind::StockChange);
        assert_eq!(alert.price_direction, None);
        assert!(alert.message().contains("Back in stock"));
    }

    #[test]
    fn test_price_drop_and_stock_flip_yield_one_merged_alert() {
        let d = delta((100.0, Availability::InStock), (90.0, Availability::OutOfStock));
        let alert = classify(&d, threshold(5.0)).unwrap();

        assert_eq!(alert.kind, AlertKind::StockChange);
        assert_eq!(alert.price_direction, Some(PriceDirection::Drop));
        assert_eq!(
            alert.availability,
            Some(AvailabilityTransition {
                from: Availability::InStock,
                to: Availability::OutOfStock,
            })
        );

        let mut batch = AlertBatch::new();
        assert!(batch.push(alert));
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_batch_merges_alerts_for_same_product() {
        let price = classify(
            &delta((100.0, Availability::InStock), (90.0, Availability::InStock)),
            threshold(5.0),
        )
        .unwrap();
        let stock = classify(
            &delta((90.0, Availability::InStock), (90.0, Availability::OutOfStock)),
            threshold(5.0),
        )
        .unwrap();

        let mut batch = AlertBatch::new();
        assert!(batch.push(price));
        assert!(!batch.push(stock));

        let alerts = batch.into_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::StockChange);
        assert_eq!(alerts[0].price_direction, Some(PriceDirection::Drop));
        assert!(alerts[0].availability.is_some());
    }

    #[test]
    fn test_pct_is_scale_invariant() {
        let base = delta((40.0, Availability::InStock), (37.5, Availability::InStock));
        let doubled = delta((80.0, Availability::InStock), (75.0, Availability::InStock));
        assert_eq!(base.pct_change, doubled.pct_change);

        let a = classify_at(&base, threshold(5.0), Utc::now()).unwrap();
        let b = classify_at(&doubled, threshold(5.0), a.generated_at).unwrap();
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.severity, b.severity);
    }
}
