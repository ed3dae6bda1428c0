//! Wall-clock trigger backend on tokio timers.
//!
//! Each registration is a tokio task that sleeps toward its target instant
//! in bounded slices and re-reads the system clock after every slice. A
//! monotonic sleep alone would fire late after the host was suspended or its
//! clock was changed; re-checking bounds that lateness to one slice.
//!
//! Fired callbacks are spawned detached, so a callback that re-registers or
//! cancels its own key never aborts itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use healthhook_core::{PendingTrigger, TriggerBackend, TriggerTask};
use healthhook_domain::{FirePrecision, Result as DomainResult};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::error::SchedulerError;

/// Longest single sleep before the wall clock is consulted again.
const DEFAULT_MAX_SLICE: Duration = Duration::from_secs(15);

struct Registration {
    generation: u64,
    pending: PendingTrigger,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

type Registry = Arc<Mutex<HashMap<String, Registration>>>;

/// Trigger backend that fires at the wall-clock instant.
pub struct PreciseTriggerBackend {
    registrations: Registry,
    next_generation: AtomicU64,
    max_slice: Duration,
    shutdown: CancellationToken,
}

impl Default for PreciseTriggerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PreciseTriggerBackend {
    /// Create an empty backend. Each registration runs as a tokio task.
    pub fn new() -> Self {
        Self {
            registrations: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
            max_slice: DEFAULT_MAX_SLICE,
            shutdown: CancellationToken::new(),
        }
    }

    /// Bound on how late a fire can be after suspension or clock changes
    pub fn with_max_slice(mut self, slice: Duration) -> Self {
        self.max_slice = slice.max(Duration::from_millis(1));
        self
    }

    /// Cancel every registration. The backend accepts new ones afterwards.
    pub fn cancel_all(&self) {
        let drained: Vec<Registration> =
            lock(&self.registrations).drain().map(|(_, r)| r).collect();
        for registration in drained {
            registration.cancel.cancel();
        }
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        lock(&self.registrations).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(
        &self,
        key: &str,
        pending: PendingTrigger,
        spawn: impl FnOnce(u64, CancellationToken) -> JoinHandle<()>,
    ) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shutdown.child_token();

        // Hold the registry while spawning so an already-due timer cannot
        // look itself up before it is recorded.
        let mut map = lock(&self.registrations);
        let handle = spawn(generation, cancel.clone());
        let replaced =
            map.insert(key.to_string(), Registration { generation, pending, cancel, handle });
        drop(map);

        if let Some(previous) = replaced {
            debug!(key, "replacing existing registration");
            previous.cancel.cancel();
        }
    }
}

impl Drop for PreciseTriggerBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl TriggerBackend for PreciseTriggerBackend {
    fn precision(&self) -> FirePrecision {
        FirePrecision::Precise
    }

    #[instrument(skip(self, task))]
    async fn schedule_once(
        &self,
        key: &str,
        at: DateTime<Utc>,
        task: TriggerTask,
    ) -> DomainResult<()> {
        let registry = Arc::clone(&self.registrations);
        let slice = self.max_slice;
        let owned_key = key.to_string();

        self.insert(key, PendingTrigger::once(key, at), move |generation, cancel| {
            tokio::spawn(async move {
                if !sleep_until_wall_clock(at, slice, &cancel).await {
                    return;
                }
                // Only the current registration may fire; a replaced one lost
                // the race to its successor.
                let claimed = {
                    let mut map = lock(&registry);
                    match map.get(&owned_key) {
                        Some(current) if current.generation == generation => {
                            map.remove(&owned_key);
                            true
                        }
                        _ => false,
                    }
                };
                if claimed {
                    debug!(key = %owned_key, "single-shot trigger fired");
                    tokio::spawn(task());
                }
            })
        });
        Ok(())
    }

    #[instrument(skip(self, task))]
    async fn schedule_every(
        &self,
        key: &str,
        period: Duration,
        task: TriggerTask,
    ) -> DomainResult<()> {
        let step = chrono::Duration::from_std(period).map_err(|err| {
            SchedulerError::InvalidSchedule { key: key.to_string(), reason: err.to_string() }
        })?;
        if period.is_zero() {
            return Err(SchedulerError::InvalidSchedule {
                key: key.to_string(),
                reason: "period must be positive".into(),
            }
            .into());
        }

        let registry = Arc::clone(&self.registrations);
        let slice = self.max_slice;
        let owned_key = key.to_string();
        let first = Utc::now() + step;

        self.insert(key, PendingTrigger::every(key, first, period), move |generation, cancel| {
            tokio::spawn(async move {
                let mut next = first;
                loop {
                    if !sleep_until_wall_clock(next, slice, &cancel).await {
                        return;
                    }

                    let now = Utc::now();
                    next += step;
                    if next <= now {
                        // Missed periods (suspension) collapse into one fire.
                        next = now + step;
                    }

                    let current = {
                        let mut map = lock(&registry);
                        match map.get_mut(&owned_key) {
                            Some(registration) if registration.generation == generation => {
                                registration.pending.next_fire = next;
                                true
                            }
                            _ => false,
                        }
                    };
                    if !current {
                        return;
                    }
                    debug!(key = %owned_key, "recurring trigger fired");
                    tokio::spawn(task());
                }
            })
        });
        Ok(())
    }

    async fn cancel(&self, key: &str) -> DomainResult<()> {
        if let Some(registration) = lock(&self.registrations).remove(key) {
            registration.cancel.cancel();
            debug!(key, "registration cancelled");
        }
        Ok(())
    }

    async fn pending(&self) -> DomainResult<Vec<PendingTrigger>> {
        let map = lock(&self.registrations);
        Ok(map
            .values()
            .filter(|registration| !registration.handle.is_finished())
            .map(|registration| registration.pending.clone())
            .collect())
    }
}

/// Sleep until the system clock reaches `target`. Returns `false` when
/// cancelled first.
async fn sleep_until_wall_clock(
    target: DateTime<Utc>,
    slice: Duration,
    cancel: &CancellationToken,
) -> bool {
    loop {
        let remaining = match (target - Utc::now()).to_std() {
            Ok(remaining) if !remaining.is_zero() => remaining,
            // Negative or zero: due now.
            _ => return !cancel.is_cancelled(),
        };

        tokio::select! {
            () = cancel.cancelled() => return false,
            () = tokio::time::sleep(remaining.min(slice)) => {}
        }
    }
}

fn lock(
    registry: &Mutex<HashMap<String, Registration>>,
) -> MutexGuard<'_, HashMap<String, Registration>> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("trigger registry mutex poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
