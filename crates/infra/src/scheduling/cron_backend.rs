//! Best-effort trigger backend on `tokio-cron-scheduler`.
//!
//! Single shots become one-shot jobs and recurring triggers become repeated
//! jobs. Fire times follow the job scheduler's tick, so they can lag the
//! wall-clock target; use [`super::PreciseTriggerBackend`] when that matters.
//!
//! # Example
//!
//! ```no_run
//! use healthhook_infra::scheduling::CronTriggerBackend;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = CronTriggerBackend::new();
//! backend.start().await?;
//! // ... hand it to a TriggerScheduler ...
//! backend.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use healthhook_core::{PendingTrigger, TriggerBackend, TriggerTask};
use healthhook_domain::{FirePrecision, Result as DomainResult};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::error::{SchedulerError, SchedulerResult};

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

struct CronRegistration {
    job_id: Uuid,
    pending: PendingTrigger,
}

type Registry = Arc<Mutex<HashMap<String, CronRegistration>>>;

/// Trigger backend that delegates timing to a [`JobScheduler`].
pub struct CronTriggerBackend {
    scheduler: tokio::sync::Mutex<Option<JobScheduler>>,
    registrations: Registry,
}

impl Default for CronTriggerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CronTriggerBackend {
    /// Create a stopped backend. Call [`CronTriggerBackend::start`] before registering.
    pub fn new() -> Self {
        Self {
            scheduler: tokio::sync::Mutex::new(None),
            registrations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create and start the underlying job scheduler.
    #[instrument(skip(self))]
    pub async fn start(&self) -> SchedulerResult<()> {
        let mut slot = self.scheduler.lock().await;
        if slot.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let scheduler =
            JobScheduler::new().await.map_err(|source| SchedulerError::CreationFailed { source })?;
        scheduler.start().await.map_err(|source| SchedulerError::StartFailed { source })?;

        *slot = Some(scheduler);
        info!("cron trigger backend started");
        Ok(())
    }

    /// Shut the job scheduler down and forget every registration.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> SchedulerResult<()> {
        let mut scheduler = self.scheduler.lock().await.take().ok_or(SchedulerError::NotRunning)?;
        lock(&self.registrations).clear();

        tokio::time::timeout(STOP_TIMEOUT, scheduler.shutdown())
            .await
            .map_err(|_| SchedulerError::Timeout { duration: STOP_TIMEOUT })?
            .map_err(|source| SchedulerError::StopFailed { source })?;

        info!("cron trigger backend stopped");
        Ok(())
    }

    /// Whether the job scheduler has been started.
    pub async fn is_running(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }

    /// Add `job` under `key`, removing whatever the key held before.
    async fn register(&self, key: &str, job: Job, pending: PendingTrigger) -> SchedulerResult<()> {
        let slot = self.scheduler.lock().await;
        let scheduler = slot.as_ref().ok_or(SchedulerError::NotRunning)?;

        let job_id = job.guid();
        let previous = lock(&self.registrations)
            .insert(key.to_string(), CronRegistration { job_id, pending });
        if let Some(previous) = previous {
            remove_job(scheduler, key, previous.job_id).await;
        }

        if let Err(source) = scheduler.add(job).await {
            lock(&self.registrations).remove(key);
            return Err(SchedulerError::JobRegistrationFailed { key: key.to_string(), source });
        }
        debug!(key, job_id = %job_id, "job registered");
        Ok(())
    }
}

#[async_trait]
impl TriggerBackend for CronTriggerBackend {
    fn precision(&self) -> FirePrecision {
        FirePrecision::BestEffort
    }

    async fn schedule_once(
        &self,
        key: &str,
        at: DateTime<Utc>,
        task: TriggerTask,
    ) -> DomainResult<()> {
        let delay = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let registry = Arc::clone(&self.registrations);
        let owned_key = key.to_string();

        let job = Job::new_one_shot_async(delay, move |job_id, _scheduler| {
            let registry = Arc::clone(&registry);
            let key = owned_key.clone();
            let task = Arc::clone(&task);
            Box::pin(async move {
                let claimed = {
                    let mut map = lock(&registry);
                    match map.get(&key) {
                        Some(current) if current.job_id == job_id => {
                            map.remove(&key);
                            true
                        }
                        _ => false,
                    }
                };
                if claimed {
                    debug!(key = %key, "one-shot job fired");
                    tokio::spawn(task());
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { key: key.to_string(), source })?;

        self.register(key, job, PendingTrigger::once(key, at)).await?;
        Ok(())
    }

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
        let owned_key = key.to_string();

        let job = Job::new_repeated_async(period, move |job_id, _scheduler| {
            let registry = Arc::clone(&registry);
            let key = owned_key.clone();
            let task = Arc::clone(&task);
            Box::pin(async move {
                let current = {
                    let mut map = lock(&registry);
                    match map.get_mut(&key) {
                        Some(registration) if registration.job_id == job_id => {
                            registration.pending.next_fire = Utc::now() + step;
                            true
                        }
                        _ => false,
                    }
                };
                if current {
                    debug!(key = %key, "repeated job fired");
                    tokio::spawn(task());
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { key: key.to_string(), source })?;

        self.register(key, job, PendingTrigger::every(key, Utc::now() + step, period)).await?;
        Ok(())
    }

    async fn cancel(&self, key: &str) -> DomainResult<()> {
        let removed = lock(&self.registrations).remove(key);
        if let Some(registration) = removed {
            if let Some(scheduler) = self.scheduler.lock().await.as_ref() {
                remove_job(scheduler, key, registration.job_id).await;
            }
        }
        Ok(())
    }

    async fn pending(&self) -> DomainResult<Vec<PendingTrigger>> {
        Ok(lock(&self.registrations).values().map(|r| r.pending.clone()).collect())
    }
}

async fn remove_job(scheduler: &JobScheduler, key: &str, job_id: Uuid) {
    if let Err(err) = scheduler.remove(&job_id).await {
        // The job may already have run and dropped itself.
        debug!(key, job_id = %job_id, error = %err, "job removal failed");
    }
}

fn lock(
    registry: &Mutex<HashMap<String, CronRegistration>>,
) -> MutexGuard<'_, HashMap<String, CronRegistration>> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("cron registry mutex poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
