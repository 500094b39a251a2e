//! Fixed-point prices and currency codes.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Non-negative fixed-point price with 8 decimal places.
/// Kept below `i64::MAX` raw units so it round-trips through SQLite integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct Price(u64);

impl Price {
    /// Number of decimal places
    pub const DECIMALS: u32 = 8;
    /// Scale factor: 10^8
    pub const SCALE: u64 = 100_000_000;
    pub const ZERO: Price = Price(0);
    /// Largest raw value that fits a signed 64-bit column.
    pub const MAX_RAW: u64 = i64::MAX as u64;

    /// Convert a decimal amount, rejecting negative, NaN and oversized values.
    pub fn from_f64(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NonFinitePrice);
        }
        if value < 0.0 {
            return Err(ValidationError::NegativePrice(value));
        }
        let scaled = (value * Self::SCALE as f64).round();
        if scaled >= Self::MAX_RAW as f64 {
            return Err(ValidationError::PriceOutOfRange(value));
        }
        Ok(Self(scaled as u64))
    }

    /// Build from raw fixed-point units (as stored).
    pub fn from_raw(raw: i64) -> Result<Self, ValidationError> {
        u64::try_from(raw)
            .map(Self)
            .map_err(|_| ValidationError::NegativePrice(raw as f64 / Self::SCALE as f64))
    }

    /// Raw fixed-point units.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Raw units as a signed integer for storage.
    #[inline]
    pub fn to_storage(self) -> i64 {
        self.0 as i64
    }

    /// Convert to f64 (for display and percentage math).
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Signed difference `new - old` in raw units.
    pub fn diff_raw(old: Price, new: Price) -> i128 {
        new.0 as i128 - old.0 as i128
    }

    /// Percentage change `(new - old) / old * 100`.
    /// `None` when `old` is zero.
    pub fn change_pct(old: Price, new: Price) -> Option<f64> {
        if old.is_zero() {
            return None;
        }
        let diff = Self::diff_raw(old, new) as f64;
        Some(diff * 100.0 / old.0 as f64)
    }
}

impl From<Price> for f64 {
    fn from(price: Price) -> Self {
        price.to_f64()
    }
}

impl TryFrom<f64> for Price {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Price::from_f64(value)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_f64())
    }
}

/// ISO 4217 style three-letter currency code, stored upper-case.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    pub const USD: Currency = Currency(*b"USD");
    pub const EUR: Currency = Currency(*b"EUR");
    pub const GBP: Currency = Currency(*b"GBP");
    pub const JPY: Currency = Currency(*b"JPY");

    /// Parse a code, accepting any ASCII case.
    pub fn new(code: &str) -> Result<Self, ValidationError> {
        let trimmed = code.trim();
        let bytes = trimmed.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(ValidationError::MalformedCurrency(code.to_string()));
        }
        let mut out = [0u8; 3];
        for (dst, src) in out.iter_mut().zip(bytes) {
            *dst = src.to_ascii_uppercase();
        }
        Ok(Self(out))
    }

    pub fn as_str(&self) -> &str {
        // Always ASCII letters by construction.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }

    /// Currency symbol used in human-readable messages.
    pub fn symbol(&self) -> &str {
        match &self.0 {
            b"USD" => "$",
            b"EUR" => "€",
            b"GBP" => "£",
            b"JPY" => "¥",
            _ => "",
        }
    }

    /// Format an amount with this currency, e.g. `$249.00` or `249.00 CHF`.
    pub fn format(&self, price: Price) -> String {
        match self.symbol() {
            "" => format!("{} {}", price, self.as_str()),
            symbol => format!("{}{}", symbol, price),
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::USD
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.as_str().to_string()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_from_f64() {
        let price = Price::from_f64(249.99).unwrap();
        assert_eq!(price.raw(), 24_999_000_000);
        assert!((price.to_f64() - 249.99).abs() < 1e-9);
        assert_eq!(price.to_string(), "249.99");
    }

    #[test]
    fn test_price_rejects_invalid() {
        assert_eq!(
            Price::from_f64(-1.0),
            Err(ValidationError::NegativePrice(-1.0))
        );
        assert_eq!(Price::from_f64(f64::NAN), Err(ValidationError::NonFinitePrice));
        assert_eq!(
            Price::from_f64(f64::INFINITY),
            Err(ValidationError::NonFinitePrice)
        );
        assert!(matches!(
            Price::from_f64(1e12),
            Err(ValidationError::PriceOutOfRange(_))
        ));
    }

    #[test]
    fn test_price_from_raw() {
        assert_eq!(Price::from_raw(100).unwrap().raw(), 100);
        assert!(Price::from_raw(-5).is_err());
    }

    #[test]
    fn test_change_pct() {
        let old = Price::from_f64(100.0).unwrap();
        let new = Price::from_f64(90.0).unwrap();
        assert_eq!(Price::change_pct(old, new), Some(-10.0));
        assert_eq!(Price::change_pct(new, new), Some(0.0));

        let up = Price::from_f64(105.0).unwrap();
        assert_eq!(Price::change_pct(old, up), Some(5.0));
    }

    #[test]
    fn test_change_pct_zero_base() {
        let new = Price::from_f64(10.0).unwrap();
        assert_eq!(Price::change_pct(Price::ZERO, new), None);
    }

    #[test]
    fn test_change_pct_scale_invariant() {
        let pairs = [(100.0, 90.0), (33.33, 37.01), (0.07, 0.05), (1999.99, 2149.5)];
        for (old, new) in pairs {
            let base = Price::change_pct(
                Price::from_f64(old).unwrap(),
                Price::from_f64(new).unwrap(),
            );
            let doubled = Price::change_pct(
                Price::from_f64(old * 2.0).unwrap(),
                Price::from_f64(new * 2.0).unwrap(),
            );
            assert_eq!(base, doubled, "{old} -> {new}");
        }
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!(Currency::new("usd").unwrap(), Currency::USD);
        assert_eq!(Currency::new(" EUR ").unwrap(), Currency::EUR);
        assert_eq!("GBP".parse::<Currency>().unwrap(), Currency::GBP);
        assert!(Currency::new("US").is_err());
        assert!(Currency::new("US$").is_err());
        assert!(Currency::new("DOLLAR").is_err());
    }

    #[test]
    fn test_currency_format() {
        let price = Price::from_f64(249.0).unwrap();
        assert_eq!(Currency::USD.format(price), "$249.00");
        assert_eq!(Currency::new("CHF").unwrap().format(price), "249.00 CHF");
    }

    #[test]
    fn test_serde_as_decimal() {
        let price = Price::from_f64(12.5).unwrap();
        assert_eq!(serde_json::to_string(&price).unwrap(), "12.5");
        let parsed: Price = serde_json::from_str("12.5").unwrap();
        assert_eq!(parsed, price);
        assert!(serde_json::from_str::<Price>("-3.0").is_err());

        assert_eq!(serde_json::to_string(&Currency::EUR).unwrap(), "\"EUR\"");
        assert!(serde_json::from_str::<Currency>("\"euro\"").is_err());
    }
}
