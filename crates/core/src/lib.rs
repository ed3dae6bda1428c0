//! # HealthHook Core
//!
//! Sync and delivery logic with no infrastructure dependencies.
//!
//! This crate contains:
//! - [`SyncService`]: incremental fetch per metric type and checkpointing
//! - [`DeliveryEngine`]: per-endpoint retry with stop-at-first-success
//! - [`TriggerScheduler`]: interval and fixed-time trigger lifecycle
//! - Port traits for the health data source, settings store, HTTP transport
//!   and trigger backend
//!
//! ## Architecture Principles
//! - Only depends on `healthhook-domain`
//! - No database, HTTP, or platform code
//! - All external collaborators via traits

pub mod clock;
pub mod delivery;
pub mod scheduling;
pub mod sync;

pub use clock::{Clock, SystemClock};
pub use delivery::{DeliveryEngine, RetryPolicy, WebhookResponse, WebhookTransport};
pub use scheduling::{
    next_occurrence, PendingTrigger, TriggerBackend, TriggerScheduler, TriggerTask,
};
pub use sync::{
    DeliveryLogStore, MetricSource, PermissionOutcome, PermissionRequestSlot, SettingsStore,
    SyncService,
};
