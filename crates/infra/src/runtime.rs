//! Composition root wiring the adapters into the core services.

use std::sync::Arc;

use healthhook_core::{
    DeliveryEngine, MetricSource, PermissionOutcome, PermissionRequestSlot, SyncService,
    TriggerBackend, TriggerScheduler, WebhookTransport,
};
use healthhook_domain::{
    EngineConfig, FirePrecision, HealthHookError, Result, SyncError, SyncResult,
};
use tokio::task;
use tracing::{info, instrument, warn};

use crate::database::{DbManager, SqliteSettingsStore};
use crate::errors::InfraError;
use crate::http::ReqwestWebhookTransport;
use crate::scheduling::{CronTriggerBackend, PreciseTriggerBackend};

enum RuntimeBackend {
    Precise(Arc<PreciseTriggerBackend>),
    BestEffort(Arc<CronTriggerBackend>),
}

impl RuntimeBackend {
    async fn start(precision: FirePrecision) -> Result<Self> {
        match precision {
            FirePrecision::Precise => Ok(Self::Precise(Arc::new(PreciseTriggerBackend::new()))),
            FirePrecision::BestEffort => {
                let backend = Arc::new(CronTriggerBackend::new());
                backend.start().await.map_err(HealthHookError::from)?;
                Ok(Self::BestEffort(backend))
            }
        }
    }

    fn as_trigger_backend(&self) -> Arc<dyn TriggerBackend> {
        match self {
            Self::Precise(backend) => Arc::clone(backend) as Arc<dyn TriggerBackend>,
            Self::BestEffort(backend) => Arc::clone(backend) as Arc<dyn TriggerBackend>,
        }
    }
}

/// A fully wired engine: settings store, delivery, sync and triggers.
///
/// The metric source is platform specific and supplied by the caller.
pub struct HealthHookRuntime {
    config: EngineConfig,
    db: Arc<DbManager>,
    store: Arc<SqliteSettingsStore>,
    sync: Arc<SyncService>,
    scheduler: TriggerScheduler,
    backend: RuntimeBackend,
    permissions: PermissionRequestSlot,
}

impl HealthHookRuntime {
    /// Build every component and restore pending triggers.
    ///
    /// A failed startup reconciliation is logged rather than returned; the
    /// next configuration change or restart retries it.
    #[instrument(skip_all, fields(db_path = %config.database.path))]
    pub async fn start(config: EngineConfig, source: Arc<dyn MetricSource>) -> Result<Self> {
        let transport = Arc::new(ReqwestWebhookTransport::from_config(&config.http)?);
        Self::start_with_transport(config, source, transport).await
    }

    /// Like [`Self::start`] with a caller-supplied webhook transport.
    pub async fn start_with_transport(
        config: EngineConfig,
        source: Arc<dyn MetricSource>,
        transport: Arc<dyn WebhookTransport>,
    ) -> Result<Self> {
        let db_config = config.database.clone();
        let db = task::spawn_blocking(move || -> Result<DbManager> {
            let db = DbManager::from_config(&db_config)?;
            db.run_migrations()?;
            Ok(db)
        })
        .await
        .map_err(|err| HealthHookError::from(InfraError::from(err)))??;
        let db = Arc::new(db);

        let store = Arc::new(SqliteSettingsStore::new(Arc::clone(&db)));
        let delivery = Arc::new(DeliveryEngine::new(transport, store.clone()));
        let sync = Arc::new(SyncService::new(source, store.clone(), delivery));

        let backend = RuntimeBackend::start(config.scheduling.precision).await?;
        let scheduler =
            TriggerScheduler::new(store.clone(), backend.as_trigger_backend(), Arc::clone(&sync));

        if let Err(err) = scheduler.reconcile_on_startup().await {
            warn!(error = %err, "startup trigger reconciliation failed");
        }

        info!(precision = ?config.scheduling.precision, "healthhook runtime started");

        Ok(Self {
            config,
            db,
            store,
            sync,
            scheduler,
            backend,
            permissions: PermissionRequestSlot::new(),
        })
    }

    /// Loaded engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared SQLite pool.
    pub fn database(&self) -> &Arc<DbManager> {
        &self.db
    }

    /// Settings and delivery log store
    pub fn store(&self) -> &Arc<SqliteSettingsStore> {
        &self.store
    }

    /// Sync service driving every pass.
    pub fn sync_service(&self) -> &Arc<SyncService> {
        &self.sync
    }

    /// Trigger scheduler bound to the configured backend.
    pub fn scheduler(&self) -> &TriggerScheduler {
        &self.scheduler
    }

    /// Slot the platform layer resolves once the user answers a permission
    /// prompt.
    pub fn permissions(&self) -> &PermissionRequestSlot {
        &self.permissions
    }

    /// Run a sync now, queueing behind any pass already in flight.
    pub async fn sync_now(&self) -> std::result::Result<SyncResult, SyncError> {
        self.sync.perform_sync().await
    }

    /// Wait for the pending permission prompt to resolve, then sync if any
    /// permission was granted.
    ///
    /// Returns `Ok(None)` when the request was denied or superseded by a
    /// newer one.
    pub async fn sync_after_permission(
        &self,
    ) -> std::result::Result<Option<SyncResult>, SyncError> {
        let receiver = self.permissions.register();
        match receiver.await {
            Ok(PermissionOutcome::Granted) => {
                if let Err(err) = self.sync.auto_enable_granted_types().await {
                    warn!(error = %err, "auto-enabling granted metric types failed");
                }
                self.sync.perform_sync().await.map(Some)
            }
            Ok(outcome) => {
                info!(?outcome, "permission request ended without a grant");
                Ok(None)
            }
            Err(_) => Ok(None),
        }
    }

    /// Stop the trigger backend. Pending triggers are restored by the next
    /// [`Self::start`].
    #[instrument(skip(self))]
    pub async fn shutdown(self) -> Result<()> {
        match &self.backend {
            RuntimeBackend::Precise(backend) => backend.cancel_all(),
            RuntimeBackend::BestEffort(backend) => {
                backend.stop().await.map_err(HealthHookError::from)?;
            }
        }
        info!("healthhook runtime stopped");
        Ok(())
    }
}
