//! Port interface for the platform facility that fires triggers
//!
//! The scheduler decides *what* must be pending; a backend decides *how* a
//! callback gets run at an instant or on a period.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use healthhook_domain::{FirePrecision, Result};

/// Callback run by a backend when a registration fires.
///
/// Invoked once for a single-shot registration and once per period for a
/// recurring one. The returned future runs detached from the registration,
/// so cancelling or replacing the key while it runs does not abort it.
pub type TriggerTask = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Registration currently held by a backend.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingTrigger {
    pub key: String,
    /// Next instant the backend expects to fire this key.
    pub next_fire: DateTime<Utc>,
    /// `Some` for recurring registrations.
    pub period: Option<Duration>,
}

impl PendingTrigger {
    /// One-shot registration firing at `at`.
    pub fn once(key: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self { key: key.into(), next_fire: at, period: None }
    }

    /// Recurring registration firing every `period` from `next_fire`.
    pub fn every(key: impl Into<String>, next_fire: DateTime<Utc>, period: Duration) -> Self {
        Self { key: key.into(), next_fire, period: Some(period) }
    }

    pub fn is_recurring(&self) -> bool {
        self.period.is_some()
    }
}

impl fmt::Debug for PendingTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTrigger")
            .field("key", &self.key)
            .field("next_fire", &self.next_fire.to_rfc3339())
            .field("period_secs", &self.period.map(|p| p.as_secs()))
            .finish()
    }
}

/// Trait for registering keyed triggers with the host environment.
///
/// Registering a key that is already pending replaces the old registration.
/// Cancelling an unknown key is not an error.
#[async_trait]
pub trait TriggerBackend: Send + Sync {
    /// How closely fires track their wall-clock target
    fn precision(&self) -> FirePrecision;

    /// Fire `task` once at `at`. Instants already in the past fire promptly.
    async fn schedule_once(&self, key: &str, at: DateTime<Utc>, task: TriggerTask) -> Result<()>;

    /// Fire `task` every `period`, first one `period` from now.
    async fn schedule_every(&self, key: &str, period: Duration, task: TriggerTask) -> Result<()>;

    /// Drop the registration for `key`, if any
    async fn cancel(&self, key: &str) -> Result<()>;

    /// Every registration that has not yet fired (single-shot) or is still
    /// active (recurring)
    async fn pending(&self) -> Result<Vec<PendingTrigger>>;
}
