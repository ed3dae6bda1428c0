//! Trigger backend that only fires when a test tells it to.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use healthhook_core::{PendingTrigger, TriggerBackend, TriggerTask};
use healthhook_domain::{FirePrecision, Result as DomainResult};

/// Backend call, in order of arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOp {
    Once(String, DateTime<Utc>),
    Every(String, Duration),
    Cancel(String),
}

/// In-memory [`TriggerBackend`] driven by [`ManualBackend::fire`].
#[derive(Default)]
pub struct ManualBackend {
    registrations: Mutex<BTreeMap<String, (PendingTrigger, TriggerTask)>>,
    ops: Mutex<Vec<BackendOp>>,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently pending, sorted.
    pub fn pending_keys(&self) -> Vec<String> {
        self.registrations.lock().unwrap().keys().cloned().collect()
    }

    pub fn registration(&self, key: &str) -> Option<PendingTrigger> {
        self.registrations.lock().unwrap().get(key).map(|(pending, _)| pending.clone())
    }

    pub fn ops(&self) -> Vec<BackendOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    /// Run the task for `key` to completion. Single shots are consumed first,
    /// the way a real backend drops them before invoking the callback.
    pub async fn fire(&self, key: &str) -> bool {
        let task = {
            let mut registrations = self.registrations.lock().unwrap();
            let Some((pending, task)) = registrations.get(key).cloned() else {
                return false;
            };
            if !pending.is_recurring() {
                registrations.remove(key);
            }
            task
        };
        task().await;
        true
    }

    /// Forget every registration, as a process restart would.
    pub fn cancel_all(&self) {
        self.registrations.lock().unwrap().clear();
    }

    /// Register a task directly, bypassing the scheduler.
    pub fn plant(&self, pending: PendingTrigger, task: TriggerTask) {
        self.registrations.lock().unwrap().insert(pending.key.clone(), (pending, task));
    }
}

#[async_trait]
impl TriggerBackend for ManualBackend {
    fn precision(&self) -> FirePrecision {
        FirePrecision::Precise
    }

    async fn schedule_once(
        &self,
        key: &str,
        at: DateTime<Utc>,
        task: TriggerTask,
    ) -> DomainResult<()> {
        self.ops.lock().unwrap().push(BackendOp::Once(key.to_string(), at));
        self.plant(PendingTrigger::once(key, at), task);
        Ok(())
    }

    async fn schedule_every(
        &self,
        key: &str,
        period: Duration,
        task: TriggerTask,
    ) -> DomainResult<()> {
        self.ops.lock().unwrap().push(BackendOp::Every(key.to_string(), period));
        let first = Utc::now() + chrono::Duration::from_std(period).unwrap();
        self.plant(PendingTrigger::every(key, first, period), task);
        Ok(())
    }

    async fn cancel(&self, key: &str) -> DomainResult<()> {
        self.ops.lock().unwrap().push(BackendOp::Cancel(key.to_string()));
        self.registrations.lock().unwrap().remove(key);
        Ok(())
    }

    async fn pending(&self) -> DomainResult<Vec<PendingTrigger>> {
        let registrations = self.registrations.lock().unwrap();
        Ok(registrations.values().map(|(pending, _)| pending.clone()).collect())
    }
}
