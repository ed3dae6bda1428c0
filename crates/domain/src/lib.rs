//! # HealthHook Domain
//!
//! Business domain types for the health metric sync and webhook delivery
//! engine.
//!
//! This crate contains:
//! - Metric, endpoint, trigger and delivery-log data types
//! - The error taxonomy shared by every layer
//! - Engine configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other HealthHook crates
//! - No I/O, only data and invariants

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
