//! Append-only price history backed by SQLite.
//!
//! This crate provides:
//! - The `price_history` table and its queries
//! - An audit trail of emitted alerts
//! - Summary statistics for run reports

pub mod db;
pub mod record;

pub use db::{LatestPair, PriceStore, StorageError};
pub use record::{AlertRecord, StoreStats};
