//! Validation errors for observations and targets.

use thiserror::Error;

/// Reasons an observation or product target is rejected before storage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("price must be non-negative, got {0}")]
    NegativePrice(f64),

    #[error("price is not a finite number")]
    NonFinitePrice,

    #[error("price {0} exceeds the storable range")]
    PriceOutOfRange(f64),

    #[error("malformed currency code: {0:?}")]
    MalformedCurrency(String),

    #[error("unparseable price: {0:?}")]
    UnparseablePrice(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("unknown availability: {0:?}")]
    UnknownAvailability(String),
}
