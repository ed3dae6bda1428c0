//! Wall-clock port
//!
//! Scheduled triggers are expressed in local wall-clock time and checkpoints
//! are stamped with "now"; both go through this trait so tests can pin time.

use chrono::{DateTime, Local};

/// Source of the current local time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Clock backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
