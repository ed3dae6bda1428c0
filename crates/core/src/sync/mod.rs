//! Sync orchestration and its ports

pub mod permission;
pub mod ports;
pub mod service;

pub use permission::{PermissionOutcome, PermissionRequestSlot};
pub use ports::{DeliveryLogStore, MetricSource, SettingsStore};
pub use service::SyncService;
