//! Core data types for the price monitor.

pub mod error;
pub mod observation;
pub mod price;
pub mod product;

pub use error::*;
pub use observation::*;
pub use price::*;
pub use product::*;
