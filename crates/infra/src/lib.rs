//! # HealthHook Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite settings store and delivery log (r2d2 pool)
//! - reqwest webhook transport
//! - Trigger backends (precise tokio timers, tokio-cron-scheduler)
//! - Configuration loading and tracing setup
//! - The [`HealthHookRuntime`] composition root
//!
//! ## Architecture
//! - Implements traits defined in `healthhook-core`
//! - Depends on `healthhook-domain` and `healthhook-core`
//! - Contains all "impure" code (I/O, timers, network)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod observability;
pub mod runtime;
pub mod scheduling;

// Re-export commonly used items
pub use database::{DbManager, SqliteSettingsStore};
pub use errors::InfraError;
pub use http::{ReqwestWebhookTransport, ReqwestWebhookTransportBuilder};
pub use observability::init_tracing;
pub use runtime::HealthHookRuntime;
pub use scheduling::{CronTriggerBackend, PreciseTriggerBackend, SchedulerError};
