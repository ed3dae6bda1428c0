//! Sync orchestration: one incremental pass over every enabled metric type.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use healthhook_domain::{
    DeliveryContext, HealthHookError, LastSync, MetricRecord, MetricType, SourceError,
    SyncError, SyncResult, WebhookPayload,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::ports::{MetricSource, SettingsStore};
use crate::clock::{Clock, SystemClock};
use crate::delivery::DeliveryEngine;

/// Records fetched for one metric type in the current pass.
struct FetchedBatch {
    metric: MetricType,
    records: Vec<MetricRecord>,
    fetched_at: DateTime<Utc>,
    previous: Option<DateTime<Utc>>,
}

/// Runs sync passes: fetch new records per type, deliver one payload per
/// type and advance the checkpoints of the types that were delivered.
///
/// At most one pass runs at a time. [`SyncService::perform_sync`] waits for
/// an in-flight pass to finish, [`SyncService::try_perform_sync`] refuses.
pub struct SyncService {
    source: Arc<dyn MetricSource>,
    settings: Arc<dyn SettingsStore>,
    delivery: Arc<DeliveryEngine>,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<()>,
}

impl SyncService {
    /// Wire a sync service over its ports with the system clock.
    pub fn new(
        source: Arc<dyn MetricSource>,
        settings: Arc<dyn SettingsStore>,
        delivery: Arc<DeliveryEngine>,
    ) -> Self {
        Self { source, settings, delivery, clock: Arc::new(SystemClock), in_flight: Mutex::new(()) }
    }

    /// Replace the wall clock used for checkpoints
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run a sync pass, queueing behind any pass already in flight.
    pub async fn perform_sync(&self) -> Result<SyncResult, SyncError> {
        let _guard = self.in_flight.lock().await;
        self.run_pass().await
    }

    /// Run a sync pass unless one is already in flight.
    ///
    /// # Errors
    ///
    /// [`SyncError::SyncInProgress`] when another pass holds the gate.
    pub async fn try_perform_sync(&self) -> Result<SyncResult, SyncError> {
        let _guard = self.in_flight.try_lock().map_err(|_| SyncError::SyncInProgress)?;
        self.run_pass().await
    }

    /// Whether a sync pass is currently running.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// First-run convenience: when nothing is enabled yet, enable exactly the
    /// types the user granted. Returns the resulting enabled set.
    #[instrument(skip(self))]
    pub async fn auto_enable_granted_types(&self) -> Result<BTreeSet<MetricType>, SyncError> {
        let enabled = self.settings.enabled_metric_types().await?;
        if !enabled.is_empty() {
            return Ok(enabled);
        }

        let granted = self.source.granted_capabilities().await;
        if granted.is_empty() {
            debug!("no granted metric types to enable");
            return Ok(enabled);
        }

        self.settings.set_enabled_metric_types(&granted).await?;
        info!(count = granted.len(), "enabled granted metric types");
        Ok(granted)
    }

    #[instrument(skip(self))]
    async fn run_pass(&self) -> Result<SyncResult, SyncError> {
        let enabled = self.settings.enabled_metric_types().await?;
        let endpoints = self.settings.endpoints().await?;
        if endpoints.is_empty() {
            warn!("sync requested with no webhook endpoints configured");
            return Err(SyncError::NoEndpointsConfigured);
        }
        if enabled.is_empty() {
            info!("no metric types enabled, nothing to sync");
            return Ok(SyncResult::NoData);
        }

        let availability = self.source.availability().await;
        if !availability.is_available() {
            return Err(SyncError::SourceUnavailable(availability.describe().to_string()));
        }

        let granted = self.source.granted_capabilities().await;
        let queryable: Vec<MetricType> =
            enabled.iter().copied().filter(|metric| granted.contains(metric)).collect();
        for metric in enabled.iter().filter(|metric| !granted.contains(metric)) {
            warn!(metric = %metric, "read permission not granted, skipping");
        }
        if queryable.is_empty() {
            return Err(SyncError::PermissionMissing);
        }

        let batches = self.fetch_new_records(&queryable).await?;
        if batches.is_empty() {
            info!("no new records since last sync");
            return Ok(SyncResult::NoData);
        }

        let mut counts = BTreeMap::new();
        let mut last_failure = None;
        let mut failed_types = 0usize;

        for batch in batches {
            let metric = batch.metric;
            let count = batch.records.len();
            let checkpoint =
                batch.previous.map_or(batch.fetched_at, |prev| prev.max(batch.fetched_at));
            let payload = WebhookPayload::new(metric, batch.records, batch.fetched_at);
            let body = encode_payload(payload)?;

            match self
                .delivery
                .deliver(&endpoints, &body, DeliveryContext::for_metric(metric, count))
                .await
            {
                Ok(()) => {
                    if let Err(err) = self.settings.set_checkpoint(metric, checkpoint).await {
                        // Records will be sent again next pass.
                        error!(metric = %metric, error = %err, "failed to advance checkpoint");
                    }
                    counts.insert(metric, count);
                    info!(metric = %metric, count, "metric type synced");
                }
                Err(err) => {
                    warn!(
                        metric = %metric,
                        count,
                        error = %err,
                        "delivery failed, checkpoint kept"
                    );
                    failed_types += 1;
                    last_failure = Some(err);
                }
            }
        }

        if counts.is_empty() {
            if let Some(last) = last_failure {
                return Err(SyncError::AllDeliveriesFailed { failed_types, last });
            }
        }

        let result = SyncResult::Success(counts);
        let last = LastSync { at: self.clock.now().with_timezone(&Utc), summary: result.summary() };
        if let Err(err) = self.settings.set_last_sync(&last).await {
            warn!(error = %err, "failed to record last sync");
        }

        info!(summary = %last.summary, failed_types, "sync pass finished");
        Ok(result)
    }

    /// Fails with `PermissionMissing` when the source refuses every type.
    async fn fetch_new_records(
        &self,
        metrics: &[MetricType],
    ) -> Result<Vec<FetchedBatch>, SyncError> {
        let mut batches = Vec::new();
        let mut refused = 0usize;

        for &metric in metrics {
            let previous = self.settings.checkpoint(metric).await?;
            let since = previous.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            let fetched_at = self.clock.now().with_timezone(&Utc);

            let records = match self.source.fetch_records(metric, since).await {
                Ok(records) => records,
                Err(SourceError::PermissionMissing(message)) => {
                    warn!(metric = %metric, %message, "permission revoked during sync, skipping");
                    refused += 1;
                    continue;
                }
                Err(SourceError::Unavailable(message)) => {
                    return Err(SyncError::SourceUnavailable(message));
                }
            };

            let fetched = records.len();
            let records: Vec<MetricRecord> =
                records.into_iter().filter(|record| record.recorded_at > since).collect();
            debug!(metric = %metric, %since, fetched, kept = records.len(), "fetched records");

            if !records.is_empty() {
                batches.push(FetchedBatch { metric, records, fetched_at, previous });
            }
        }

        if refused > 0 && refused == metrics.len() {
            return Err(SyncError::PermissionMissing);
        }
        Ok(batches)
    }
}

fn encode_payload(payload: WebhookPayload) -> Result<Vec<u8>, SyncError> {
    serde_json::to_vec(&payload).map_err(|err| {
        SyncError::Infrastructure(HealthHookError::Internal(format!(
            "failed to serialize {} payload: {err}",
            payload.data_type
        )))
    })
}
