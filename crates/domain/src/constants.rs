//! Domain constants
//!
//! Centralized location for the limits and defaults of the sync engine.

// Delivery log
pub const MAX_DELIVERY_LOG_ENTRIES: usize = 100;

// Sync cadence
pub const MIN_SYNC_INTERVAL_MINUTES: u32 = 15;
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u32 = 60;

// Webhook delivery
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;
pub const INITIAL_RETRY_DELAY_MS: u64 = 1_000;
pub const HTTP_TIMEOUT_SECS: u64 = 10;
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

// Trigger registration keys
pub const INTERVAL_TRIGGER_KEY: &str = "interval-sync";
pub const SCHEDULED_TRIGGER_KEY_PREFIX: &str = "scheduled:";

// Sync result messages
pub const NO_DATA_MESSAGE: &str = "No new data to sync";
pub const SYNC_COMPLETED_MESSAGE: &str = "Sync completed successfully";
