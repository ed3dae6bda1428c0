//! Dual-mode trigger scheduler.
//!
//! Owns the two mutually exclusive trigger sets:
//!
//! - **Interval**: one recurring registration under [`INTERVAL_TRIGGER_KEY`].
//! - **Scheduled**: one single-shot registration per enabled
//!   [`ScheduledTrigger`], keyed by the trigger id. After each fire the
//!   trigger re-arms itself for the next day while it is still configured
//!   and enabled.
//!
//! Every mutation ends with the backend's pending set equal to the active
//! mode's definition. [`TriggerScheduler::reconcile`] restores that state
//! from persisted settings and is safe to repeat.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use healthhook_domain::constants::INTERVAL_TRIGGER_KEY;
use healthhook_domain::{
    scheduled_trigger_key, validate_interval_minutes, HealthHookError, ScheduledTrigger,
    SyncError, SyncMode, SyncResult,
};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, instrument, warn};

use super::next_fire::next_occurrence;
use super::ports::{PendingTrigger, TriggerBackend, TriggerTask};
use crate::clock::{Clock, SystemClock};
use crate::sync::{SettingsStore, SyncService};

/// Registration the active mode requires.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Desired {
    Every(Duration),
    Once { trigger_id: String, at: chrono::DateTime<Utc> },
}

struct SchedulerInner {
    settings: Arc<dyn SettingsStore>,
    backend: Arc<dyn TriggerBackend>,
    sync: Arc<SyncService>,
    clock: Arc<dyn Clock>,
    /// Serializes configuration changes against each other and re-arming.
    config_lock: Mutex<()>,
    startup: OnceCell<()>,
}

/// Keeps backend registrations in line with the persisted sync mode.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct TriggerScheduler {
    inner: Arc<SchedulerInner>,
}

impl TriggerScheduler {
    /// Wire a scheduler over the settings store and backend with the system clock.
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        backend: Arc<dyn TriggerBackend>,
        sync: Arc<SyncService>,
    ) -> Self {
        Self::with_clock(settings, backend, sync, Arc::new(SystemClock))
    }

    /// Same as [`TriggerScheduler::new`] with an injected clock.
    pub fn with_clock(
        settings: Arc<dyn SettingsStore>,
        backend: Arc<dyn TriggerBackend>,
        sync: Arc<SyncService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                settings,
                backend,
                sync,
                clock,
                config_lock: Mutex::new(()),
                startup: OnceCell::new(),
            }),
        }
    }

    /// Persist `mode` and swap the pending trigger set over to it.
    ///
    /// Invalid modes (interval below the minimum) are rejected before
    /// anything is written or registered.
    #[instrument(skip(self))]
    pub async fn switch_mode(&self, mode: SyncMode) -> Result<(), SyncError> {
        mode.validate()?;
        let _guard = self.inner.config_lock.lock().await;

        self.inner.settings.set_sync_mode(&mode).await?;
        info!(mode = %mode.kind(), "sync mode switched");
        self.apply(&mode).await
    }

    /// Change the interval length. Re-registers the interval trigger when
    /// interval mode is active; otherwise the value is only remembered.
    #[instrument(skip(self))]
    pub async fn set_sync_interval(&self, minutes: u32) -> Result<(), SyncError> {
        validate_interval_minutes(minutes)?;
        let _guard = self.inner.config_lock.lock().await;

        self.inner.settings.set_sync_interval_minutes(minutes).await?;
        if let SyncMode::Interval { .. } = self.inner.settings.sync_mode().await? {
            let mode = SyncMode::Interval { period_minutes: minutes };
            self.inner.settings.set_sync_mode(&mode).await?;
            self.apply(&mode).await?;
        }
        Ok(())
    }

    /// Add a new daily trigger and register it if scheduled mode is active.
    #[instrument(skip(self, trigger), fields(trigger_id = %trigger.id))]
    pub async fn add_trigger(&self, trigger: ScheduledTrigger) -> Result<(), SyncError> {
        trigger.validate()?;
        let _guard = self.inner.config_lock.lock().await;

        let mut triggers = self.inner.settings.scheduled_triggers().await?;
        if triggers.iter().any(|existing| existing.id == trigger.id) {
            return Err(SyncError::ConfigInvalid(format!("trigger {} already exists", trigger.id)));
        }
        triggers.push(trigger.clone());
        self.inner.settings.set_scheduled_triggers(&triggers).await?;

        self.sync_one(&trigger).await
    }

    /// Replace a trigger's time, label or enabled flag.
    #[instrument(skip(self, trigger), fields(trigger_id = %trigger.id))]
    pub async fn update_trigger(&self, trigger: ScheduledTrigger) -> Result<(), SyncError> {
        trigger.validate()?;
        let _guard = self.inner.config_lock.lock().await;

        let mut triggers = self.inner.settings.scheduled_triggers().await?;
        let slot = triggers
            .iter_mut()
            .find(|existing| existing.id == trigger.id)
            .ok_or_else(|| unknown_trigger(&trigger.id))?;
        *slot = trigger.clone();
        self.inner.settings.set_scheduled_triggers(&triggers).await?;

        self.sync_one(&trigger).await
    }

    /// Enable or disable a trigger by id.
    pub async fn set_trigger_enabled(&self, id: &str, enabled: bool) -> Result<(), SyncError> {
        let _guard = self.inner.config_lock.lock().await;

        let mut triggers = self.inner.settings.scheduled_triggers().await?;
        let slot = triggers
            .iter_mut()
            .find(|existing| existing.id == id)
            .ok_or_else(|| unknown_trigger(id))?;
        slot.enabled = enabled;
        let trigger = slot.clone();
        self.inner.settings.set_scheduled_triggers(&triggers).await?;

        debug!(trigger_id = id, enabled, "trigger toggled");
        self.sync_one(&trigger).await
    }

    /// Delete a trigger and cancel its pending fire. Unknown ids only cancel.
    #[instrument(skip(self))]
    pub async fn remove_trigger(&self, id: &str) -> Result<bool, SyncError> {
        let _guard = self.inner.config_lock.lock().await;

        let mut triggers = self.inner.settings.scheduled_triggers().await?;
        let before = triggers.len();
        triggers.retain(|existing| existing.id != id);
        let removed = triggers.len() != before;
        if removed {
            self.inner.settings.set_scheduled_triggers(&triggers).await?;
        }

        self.inner.backend.cancel(&scheduled_trigger_key(id)).await?;
        Ok(removed)
    }

    /// Bring backend registrations in line with persisted settings.
    ///
    /// Registrations that already match are left untouched, so repeated
    /// calls with unchanged configuration do not reset interval phase or
    /// re-arm single shots.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<(), SyncError> {
        let _guard = self.inner.config_lock.lock().await;
        let mode = self.inner.settings.sync_mode().await?;
        self.apply(&mode).await
    }

    /// Run [`Self::reconcile`] once for this scheduler's lifetime.
    ///
    /// Intended for process start, where registrations may have been lost.
    /// A failed attempt is retried by the next call.
    pub async fn reconcile_on_startup(&self) -> Result<(), SyncError> {
        self.inner
            .startup
            .get_or_try_init(|| async {
                info!("reconciling triggers after startup");
                self.reconcile().await
            })
            .await
            .map(|_| ())
    }

    /// Fire path for a scheduled trigger: sync, then re-arm for tomorrow if
    /// the trigger is still configured and enabled.
    #[instrument(skip(self))]
    pub async fn handle_scheduled_fire(&self, trigger_id: &str) -> Result<SyncResult, SyncError> {
        let outcome = self.inner.sync.perform_sync().await;
        log_outcome("scheduled", &outcome);

        if let Err(err) = self.rearm(trigger_id).await {
            error!(trigger_id, error = %err, "failed to re-arm scheduled trigger");
        }
        outcome
    }

    /// Fire path for the interval trigger.
    #[instrument(skip(self))]
    pub async fn handle_interval_fire(&self) -> Result<SyncResult, SyncError> {
        let outcome = self.inner.sync.perform_sync().await;
        log_outcome("interval", &outcome);
        outcome
    }

    /// Backend registrations currently pending
    pub async fn pending(&self) -> Result<Vec<PendingTrigger>, SyncError> {
        Ok(self.inner.backend.pending().await?)
    }

    async fn rearm(&self, trigger_id: &str) -> Result<(), SyncError> {
        let _guard = self.inner.config_lock.lock().await;

        if self.inner.settings.sync_mode().await? != SyncMode::Scheduled {
            debug!(trigger_id, "scheduled mode no longer active, not re-arming");
            return Ok(());
        }

        let triggers = self.inner.settings.scheduled_triggers().await?;
        match triggers.iter().find(|trigger| trigger.id == trigger_id) {
            Some(trigger) if trigger.enabled => self.register_once(trigger).await,
            _ => {
                debug!(trigger_id, "trigger removed or disabled, not re-arming");
                Ok(())
            }
        }
    }

    /// Apply one trigger's change without disturbing the others.
    async fn sync_one(&self, trigger: &ScheduledTrigger) -> Result<(), SyncError> {
        let scheduled = self.inner.settings.sync_mode().await? == SyncMode::Scheduled;
        if scheduled && trigger.enabled {
            self.register_once(trigger).await
        } else {
            self.inner.backend.cancel(&trigger.registration_key()).await?;
            Ok(())
        }
    }

    async fn apply(&self, mode: &SyncMode) -> Result<(), SyncError> {
        let desired = self.desired_registrations(mode).await?;
        let pending: BTreeMap<String, PendingTrigger> = self
            .inner
            .backend
            .pending()
            .await?
            .into_iter()
            .map(|registration| (registration.key.clone(), registration))
            .collect();

        for key in pending.keys().filter(|key| !desired.contains_key(*key)) {
            debug!(key = %key, "cancelling trigger outside active mode");
            self.inner.backend.cancel(key).await?;
        }

        for (key, wanted) in &desired {
            let current = pending.get(key);
            match wanted {
                Desired::Every(period) => {
                    if current.is_some_and(|p| p.period == Some(*period)) {
                        continue;
                    }
                    self.inner
                        .backend
                        .schedule_every(key, *period, self.interval_task())
                        .await?;
                    info!(
                        key = %key,
                        period_secs = period.as_secs(),
                        "interval trigger registered"
                    );
                }
                Desired::Once { trigger_id, at } => {
                    if current.is_some_and(|p| p.period.is_none() && p.next_fire == *at) {
                        continue;
                    }
                    self.inner
                        .backend
                        .schedule_once(key, *at, self.scheduled_task(trigger_id.clone()))
                        .await?;
                    info!(key = %key, at = %at, "scheduled trigger registered");
                }
            }
        }

        Ok(())
    }

    async fn desired_registrations(
        &self,
        mode: &SyncMode,
    ) -> Result<BTreeMap<String, Desired>, SyncError> {
        let mut desired = BTreeMap::new();
        match mode {
            SyncMode::Interval { period_minutes } => {
                validate_interval_minutes(*period_minutes)?;
                let period = Duration::from_secs(u64::from(*period_minutes) * 60);
                desired.insert(INTERVAL_TRIGGER_KEY.to_string(), Desired::Every(period));
            }
            SyncMode::Scheduled => {
                let now = self.inner.clock.now();
                for trigger in self.inner.settings.scheduled_triggers().await? {
                    if !trigger.enabled {
                        continue;
                    }
                    let at = match next_occurrence(trigger.hour, trigger.minute, &now) {
                        Ok(at) => at.with_timezone(&Utc),
                        Err(err) => {
                            warn!(
                                trigger_id = %trigger.id,
                                error = %err,
                                "skipping unschedulable trigger"
                            );
                            continue;
                        }
                    };
                    desired.insert(
                        trigger.registration_key(),
                        Desired::Once { trigger_id: trigger.id, at },
                    );
                }
            }
        }
        Ok(desired)
    }

    async fn register_once(&self, trigger: &ScheduledTrigger) -> Result<(), SyncError> {
        let now = self.inner.clock.now();
        let at = next_occurrence(trigger.hour, trigger.minute, &now)?.with_timezone(&Utc);
        self.inner
            .backend
            .schedule_once(&trigger.registration_key(), at, self.scheduled_task(trigger.id.clone()))
            .await?;
        info!(
            trigger_id = %trigger.id,
            time = %trigger.display_time(),
            at = %at,
            "scheduled trigger armed"
        );
        Ok(())
    }

    fn scheduled_task(&self, trigger_id: String) -> TriggerTask {
        let inner = Arc::downgrade(&self.inner);
        Arc::new(move || {
            let inner = Weak::clone(&inner);
            let trigger_id = trigger_id.clone();
            async move {
                if let Some(inner) = inner.upgrade() {
                    let _ = TriggerScheduler { inner }.handle_scheduled_fire(&trigger_id).await;
                }
            }
            .boxed()
        })
    }

    fn interval_task(&self) -> TriggerTask {
        let inner = Arc::downgrade(&self.inner);
        Arc::new(move || {
            let inner = Weak::clone(&inner);
            async move {
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                // Ticks do not queue behind a pass that is still running.
                if inner.sync.is_syncing() {
                    debug!("sync still in flight, skipping interval tick");
                    return;
                }
                let _ = TriggerScheduler { inner }.handle_interval_fire().await;
            }
            .boxed()
        })
    }
}

fn unknown_trigger(id: &str) -> SyncError {
    SyncError::Infrastructure(HealthHookError::NotFound(format!("scheduled trigger {id}")))
}

fn log_outcome(source: &'static str, outcome: &Result<SyncResult, SyncError>) {
    match outcome {
        Ok(result) => info!(source, message = %result.message(), "triggered sync finished"),
        Err(err) => warn!(source, error = %err, kind = err.label(), "triggered sync failed"),
    }
}
