//! Trigger backends for the trigger scheduler
//!
//! Both backends implement [`healthhook_core::TriggerBackend`]:
//! - [`PreciseTriggerBackend`] sleeps in bounded slices and re-reads the wall
//!   clock, so a fire lands on its target even after the host sleeps or the
//!   clock jumps.
//! - [`CronTriggerBackend`] hands delays to `tokio-cron-scheduler` and accepts
//!   its tick jitter.
//!
//! Backends follow the same runtime rules:
//! - Explicit lifecycle management (start/stop or drop)
//! - Join handles and cancellation tokens for spawned waiters
//! - Fired callbacks are spawned detached so a callback may re-register its
//!   own key

pub mod cron_backend;
pub mod error;
pub mod precise_backend;

pub use cron_backend::CronTriggerBackend;
pub use error::{SchedulerError, SchedulerResult};
pub use precise_backend::PreciseTriggerBackend;
