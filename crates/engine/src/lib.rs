//! Price change detection engine.
//!
//! This crate compares consecutive observations of a product and turns
//! significant differences into alerts.

pub mod alert;
pub mod classifier;
pub mod detector;

pub use alert::*;
pub use classifier::*;
pub use detector::*;
