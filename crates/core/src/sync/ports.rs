//! Port interfaces for sync operations
//!
//! The health data provider and the persistent settings store are external
//! collaborators; these traits are the only view the engine has of them.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use healthhook_domain::{
    DeliveryLogEntry, LastSync, MetricRecord, MetricType, Result, ScheduledTrigger,
    SourceAvailability, SourceError, SyncMode, WebhookEndpoint,
};

/// Trait for reading records from the local health data provider
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Whether the provider is installed and usable
    async fn availability(&self) -> SourceAvailability;

    /// Metric types the user granted read access to.
    ///
    /// Implementations fail closed: any error yields an empty set.
    async fn granted_capabilities(&self) -> BTreeSet<MetricType>;

    /// Records of `metric` with an event time strictly after `since`
    async fn fetch_records(
        &self,
        metric: MetricType,
        since: DateTime<Utc>,
    ) -> std::result::Result<Vec<MetricRecord>, SourceError>;
}

/// Trait for persisted sync configuration and bookkeeping.
///
/// Every operation is atomic for its own key. Getters degrade to defaults
/// when a stored value cannot be decoded.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Configured webhook endpoints, in delivery order
    async fn endpoints(&self) -> Result<Vec<WebhookEndpoint>>;

    /// Replace the endpoint list
    async fn set_endpoints(&self, endpoints: &[WebhookEndpoint]) -> Result<()>;

    /// Metric types the user enabled for sync
    async fn enabled_metric_types(&self) -> Result<BTreeSet<MetricType>>;

    /// Replace the enabled metric types
    async fn set_enabled_metric_types(&self, types: &BTreeSet<MetricType>) -> Result<()>;

    /// Active sync mode (interval mode carries the stored interval)
    async fn sync_mode(&self) -> Result<SyncMode>;

    /// Persist the active sync mode; interval mode also stores its period
    async fn set_sync_mode(&self, mode: &SyncMode) -> Result<()>;

    /// Stored interval length, also remembered while scheduled mode is active
    async fn sync_interval_minutes(&self) -> Result<u32>;

    /// Persist the interval length without touching the active mode
    async fn set_sync_interval_minutes(&self, minutes: u32) -> Result<()>;

    /// User-defined daily triggers
    async fn scheduled_triggers(&self) -> Result<Vec<ScheduledTrigger>>;

    /// Replace the daily trigger list
    async fn set_scheduled_triggers(&self, triggers: &[ScheduledTrigger]) -> Result<()>;

    /// Last successful sync instant for one metric type
    async fn checkpoint(&self, metric: MetricType) -> Result<Option<DateTime<Utc>>>;

    /// Advance one metric type's checkpoint (never a bulk overwrite)
    async fn set_checkpoint(&self, metric: MetricType, at: DateTime<Utc>) -> Result<()>;

    /// Timestamp and summary of the last sync that delivered data
    async fn last_sync(&self) -> Result<Option<LastSync>>;

    /// Record the last successful sync
    async fn set_last_sync(&self, last: &LastSync) -> Result<()>;
}

/// Trait for the capped, append-only delivery log
#[async_trait]
pub trait DeliveryLogStore: Send + Sync {
    /// Prepend an entry, evicting the oldest beyond capacity
    async fn append_delivery_log(&self, entry: DeliveryLogEntry) -> Result<()>;

    /// Entries, newest first
    async fn delivery_logs(&self) -> Result<Vec<DeliveryLogEntry>>;

    /// Remove every entry
    async fn clear_delivery_logs(&self) -> Result<()>;
}
