//! Domain types and models

pub mod delivery_log;
pub mod metric;
pub mod schedule;
pub mod sync;
pub mod webhook;

pub use delivery_log::{DeliveryContext, DeliveryLog, DeliveryLogEntry};
pub use metric::{MetricRecord, MetricType, SourceAvailability};
pub use schedule::{
    scheduled_trigger_id, scheduled_trigger_key, validate_interval_minutes, ScheduledTrigger,
    SyncMode, SyncModeKind,
};
pub use sync::{LastSync, SyncResult};
pub use webhook::{WebhookEndpoint, WebhookPayload};
