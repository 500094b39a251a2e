//! Alert types produced by the classifier.

use crate::AvailabilityTransition;
use chrono::{DateTime, Utc};
use pricewatch_core::{Currency, Price, ProductId};
use pricewatch_store::AlertRecord;
use serde::Serialize;
use std::fmt;

/// What kind of change an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PriceDrop,
    PriceIncrease,
    StockChange,
    /// Never emitted; deltas without a qualifying change produce no alert.
    NoChange,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::PriceDrop => "price_drop",
            AlertKind::PriceIncrease => "price_increase",
            AlertKind::StockChange => "stock_change",
            AlertKind::NoChange => "no_change",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            AlertKind::PriceDrop => "📉",
            AlertKind::PriceIncrease => "📈",
            AlertKind::StockChange => "📦",
            AlertKind::NoChange => "ℹ️",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far past the threshold a change is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// threshold <= |pct| < 2x threshold
    Notice,
    /// 2x threshold <= |pct| < 4x threshold, or any stock flip
    Significant,
    /// |pct| >= 4x threshold
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Notice => "notice",
            Severity::Significant => "significant",
            Severity::Critical => "critical",
        }
    }

    /// Severity of a price move of `abs_pct` percent against `threshold_pct`.
    pub fn for_price_move(abs_pct: f64, threshold_pct: f64) -> Self {
        if abs_pct >= threshold_pct * 4.0 {
            Severity::Critical
        } else if abs_pct >= threshold_pct * 2.0 {
            Severity::Significant
        } else {
            Severity::Notice
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a price move that crossed the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceDirection {
    Drop,
    Increase,
}

/// One alert per product per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub product: ProductId,
    pub product_name: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub currency: Currency,
    pub old_price: Price,
    pub new_price: Price,
    pub pct_change: Option<f64>,
    /// Set when the price moved by at least the threshold.
    pub price_direction: Option<PriceDirection>,
    pub availability: Option<AvailabilityTransition>,
    pub generated_at: DateTime<Utc>,
}

impl Alert {
    /// Kind implied by the carried facts; a stock flip outranks a price move.
    pub fn derived_kind(
        price_direction: Option<PriceDirection>,
        availability: Option<AvailabilityTransition>,
    ) -> AlertKind {
        match (availability, price_direction) {
            (Some(_), _) => AlertKind::StockChange,
            (None, Some(PriceDirection::Drop)) => AlertKind::PriceDrop,
            (None, Some(PriceDirection::Increase)) => AlertKind::PriceIncrease,
            (None, None) => AlertKind::NoChange,
        }
    }

    /// Fold a later alert for the same product into this one. Facts carried
    /// by `other` replace the corresponding facts here.
    pub fn merge(&mut self, other: Alert) {
        debug_assert_eq!(self.product, other.product);

        if other.price_direction.is_some() {
            self.price_direction = other.price_direction;
            self.old_price = other.old_price;
            self.new_price = other.new_price;
            self.pct_change = other.pct_change;
            self.currency = other.currency;
        }
        if other.availability.is_some() {
            self.availability = other.availability;
        }
        if !other.product_name.is_empty() {
            self.product_name = other.product_name;
        }
        self.kind = Self::derived_kind(self.price_direction, self.availability);
        self.severity = self.severity.max(other.severity);
        self.generated_at = self.generated_at.max(other.generated_at);
    }

    fn price_summary(&self) -> Option<String> {
        let direction = match self.price_direction? {
            PriceDirection::Drop => "dropped",
            PriceDirection::Increase => "increased",
        };
        let pct = self
            .pct_change
            .map(|pct| format!(" {:.1}%", pct.abs()))
            .unwrap_or_default();
        Some(format!(
            "Price {}{} ({} → {})",
            direction,
            pct,
            self.currency.format(self.old_price),
            self.currency.format(self.new_price)
        ))
    }

    fn stock_summary(&self) -> Option<String> {
        let transition = self.availability?;
        Some(if transition.is_restock() {
            "Back in stock".to_string()
        } else {
            format!("Now {}", transition.to)
        })
    }

    /// Human-readable one-line description.
    pub fn message(&self) -> String {
        let facts: Vec<String> = [self.stock_summary(), self.price_summary()]
            .into_iter()
            .flatten()
            .collect();
        format!(
            "{} {} ({}): {}",
            self.kind.emoji(),
            self.product_name,
            self.product.retailer,
            facts.join("; ")
        )
    }

    /// Percentage formatted for tables, e.g. `-10.0%`.
    pub fn pct_label(&self) -> String {
        self.pct_change
            .map(|pct| format!("{:+.1}%", pct))
            .unwrap_or_else(|| "N/A".to_string())
    }
}

impl From<&Alert> for AlertRecord {
    fn from(alert: &Alert) -> Self {
        AlertRecord {
            retailer: alert.product.retailer.to_string(),
            product_url: alert.product.url.clone(),
            product_name: alert.product_name.clone(),
            alert_type: alert.kind.as_str().to_string(),
            severity: alert.severity.as_str().to_string(),
            old_price: Some(alert.old_price.to_f64()),
            new_price: Some(alert.new_price.to_f64()),
            pct_change: alert.pct_change.map(|pct| (pct * 100.0).round() / 100.0),
            message: alert.message(),
            created_at: alert.generated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricewatch_core::Availability;

    fn alert() -> Alert {
        Alert {
            product: ProductId::new("Amazon", "https://amazon.com/dp/1").unwrap(),
            product_name: "Powerbeats Pro 2".to_string(),
            kind: AlertKind::PriceDrop,
            severity: Severity::Significant,
            currency: Currency::USD,
            old_price: Price::from_f64(100.0).unwrap(),
            new_price: Price::from_f64(90.0).unwrap(),
            pct_change: Some(-10.0),
            price_direction: Some(PriceDirection::Drop),
            availability: None,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(Severity::for_price_move(5.0, 5.0), Severity::Notice);
        assert_eq!(Severity::for_price_move(9.99, 5.0), Severity::Notice);
        assert_eq!(Severity::for_price_move(10.0, 5.0), Severity::Significant);
        assert_eq!(Severity::for_price_move(20.0, 5.0), Severity::Critical);
    }

    #[test]
    fn test_price_message() {
        assert_eq!(
            alert().message(),
            "📉 Powerbeats Pro 2 (Amazon): Price dropped 10.0% ($100.00 → $90.00)"
        );
        assert_eq!(alert().pct_label(), "-10.0%");
    }

    #[test]
    fn test_merge_stock_into_price_alert() {
        let mut merged = alert();
        let mut stock = alert();
        stock.kind = AlertKind::StockChange;
        stock.price_direction = None;
        stock.availability = Some(AvailabilityTransition {
            from: Availability::InStock,
            to: Availability::OutOfStock,
        });

        merged.merge(stock);
        assert_eq!(merged.kind, AlertKind::StockChange);
        assert_eq!(merged.price_direction, Some(PriceDirection::Drop));
        assert_eq!(
            merged.message(),
            "📦 Powerbeats Pro 2 (Amazon): Now out of stock; Price dropped 10.0% ($100.00 → $90.00)"
        );
    }

    #[test]
    fn test_alert_record_conversion() {
        let record = AlertRecord::from(&alert());
        assert_eq!(record.alert_type, "price_drop");
        assert_eq!(record.severity, "significant");
        assert_eq!(record.old_price, Some(100.0));
        assert_eq!(record.pct_change, Some(-10.0));
    }
}
