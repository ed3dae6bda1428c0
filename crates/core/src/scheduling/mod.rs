//! Trigger scheduling: what must be pending, and the port that runs it

pub mod next_fire;
pub mod ports;
pub mod trigger_scheduler;

pub use next_fire::next_occurrence;
pub use ports::{PendingTrigger, TriggerBackend, TriggerTask};
pub use trigger_scheduler::TriggerScheduler;
