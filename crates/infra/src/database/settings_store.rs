//! SQLite-backed settings store and delivery log.
//!
//! Every setting is its own row in `settings`, written with a single-row
//! upsert, so concurrent writers of unrelated keys never clobber each other.
//! Values are JSON. A value that no longer decodes is logged and treated as
//! absent, so one bad row cannot block future syncs. All database work runs
//! in `spawn_blocking`.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use healthhook_core::{DeliveryLogStore, SettingsStore};
use healthhook_domain::constants::{DEFAULT_SYNC_INTERVAL_MINUTES, MAX_DELIVERY_LOG_ENTRIES};
use healthhook_domain::{
    validate_interval_minutes, DeliveryLogEntry, HealthHookError, LastSync, MetricType,
    Result as DomainResult, ScheduledTrigger, SyncMode, SyncModeKind, WebhookEndpoint,
};
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task;
use tracing::{debug, warn};

use super::manager::{map_sql_error, DbManager};
use crate::errors::InfraError;

const KEY_ENDPOINTS: &str = "webhook_endpoints";
/// Older installs stored a comma-separated URL list under this key.
const KEY_LEGACY_URLS: &str = "webhook_urls";
const KEY_ENABLED_TYPES: &str = "enabled_metric_types";
const KEY_SYNC_MODE: &str = "sync_mode";
const KEY_SYNC_INTERVAL: &str = "sync_interval_minutes";
const KEY_TRIGGERS: &str = "scheduled_triggers";
const KEY_LAST_SYNC: &str = "last_sync";
const CHECKPOINT_PREFIX: &str = "checkpoint.";

/// SQLite implementation of [`SettingsStore`] and [`DeliveryLogStore`].
pub struct SqliteSettingsStore {
    db: Arc<DbManager>,
    log_capacity: usize,
}

impl SqliteSettingsStore {
    /// Store backed by the given pool with the default delivery log capacity.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db, log_capacity: MAX_DELIVERY_LOG_ENTRIES }
    }

    /// Override how many delivery log rows are kept
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity.max(1);
        self
    }

    async fn read_raw(&self, key: &str) -> DomainResult<Option<String>> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<String>> {
            let conn = db.get_connection()?;
            conn.query_row("SELECT value_json FROM settings WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn write_raw(&self, key: &str, value_json: String) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO settings (key, value_json, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    value_json = excluded.value_json,
                    updated_at = excluded.updated_at",
                params![key, value_json, Utc::now().timestamp()],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> DomainResult<Option<T>> {
        let Some(raw) = self.read_raw(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(key, error = %err, "stored setting does not decode, using default");
                Ok(None)
            }
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> DomainResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|err| HealthHookError::from(InfraError::from(err)))?;
        self.write_raw(key, json).await
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn endpoints(&self) -> DomainResult<Vec<WebhookEndpoint>> {
        if let Some(raw) = self.read_raw(KEY_ENDPOINTS).await? {
            return Ok(decode_endpoints(&raw));
        }
        match self.read_raw(KEY_LEGACY_URLS).await? {
            Some(raw) => {
                debug!("reading legacy webhook url list");
                Ok(decode_endpoints(&raw))
            }
            None => Ok(Vec::new()),
        }
    }

    async fn set_endpoints(&self, endpoints: &[WebhookEndpoint]) -> DomainResult<()> {
        self.write_json(KEY_ENDPOINTS, endpoints).await
    }

    async fn enabled_metric_types(&self) -> DomainResult<BTreeSet<MetricType>> {
        let names: Vec<String> = self.read_json(KEY_ENABLED_TYPES).await?.unwrap_or_default();
        Ok(names
            .iter()
            .filter_map(|name| match MetricType::from_str(name) {
                Ok(metric) => Some(metric),
                Err(err) => {
                    warn!(%err, "ignoring unknown enabled metric type");
                    None
                }
            })
            .collect())
    }

    async fn set_enabled_metric_types(&self, types: &BTreeSet<MetricType>) -> DomainResult<()> {
        self.write_json(KEY_ENABLED_TYPES, types).await
    }

    async fn sync_mode(&self) -> DomainResult<SyncMode> {
        let kind: SyncModeKind = self.read_json(KEY_SYNC_MODE).await?.unwrap_or_default();
        Ok(match kind {
            SyncModeKind::Interval => {
                SyncMode::Interval { period_minutes: self.sync_interval_minutes().await? }
            }
            SyncModeKind::Scheduled => SyncMode::Scheduled,
        })
    }

    async fn set_sync_mode(&self, mode: &SyncMode) -> DomainResult<()> {
        if let SyncMode::Interval { period_minutes } = mode {
            self.set_sync_interval_minutes(*period_minutes).await?;
        }
        self.write_json(KEY_SYNC_MODE, &mode.kind()).await
    }

    async fn sync_interval_minutes(&self) -> DomainResult<u32> {
        let stored: Option<u32> = self.read_json(KEY_SYNC_INTERVAL).await?;
        Ok(match stored {
            Some(minutes) if validate_interval_minutes(minutes).is_ok() => minutes,
            Some(minutes) => {
                warn!(minutes, "stored sync interval below minimum, using default");
                DEFAULT_SYNC_INTERVAL_MINUTES
            }
            None => DEFAULT_SYNC_INTERVAL_MINUTES,
        })
    }

    async fn set_sync_interval_minutes(&self, minutes: u32) -> DomainResult<()> {
        validate_interval_minutes(minutes)
            .map_err(|err| HealthHookError::InvalidInput(err.to_string()))?;
        self.write_json(KEY_SYNC_INTERVAL, &minutes).await
    }

    async fn scheduled_triggers(&self) -> DomainResult<Vec<ScheduledTrigger>> {
        Ok(self.read_json(KEY_TRIGGERS).await?.unwrap_or_default())
    }

    async fn set_scheduled_triggers(&self, triggers: &[ScheduledTrigger]) -> DomainResult<()> {
        self.write_json(KEY_TRIGGERS, triggers).await
    }

    async fn checkpoint(&self, metric: MetricType) -> DomainResult<Option<DateTime<Utc>>> {
        self.read_json(&checkpoint_key(metric)).await
    }

    async fn set_checkpoint(&self, metric: MetricType, at: DateTime<Utc>) -> DomainResult<()> {
        self.write_json(&checkpoint_key(metric), &at).await
    }

    async fn last_sync(&self) -> DomainResult<Option<LastSync>> {
        self.read_json(KEY_LAST_SYNC).await
    }

    async fn set_last_sync(&self, last: &LastSync) -> DomainResult<()> {
        self.write_json(KEY_LAST_SYNC, last).await
    }
}

#[async_trait]
impl DeliveryLogStore for SqliteSettingsStore {
    async fn append_delivery_log(&self, entry: DeliveryLogEntry) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let capacity = i64::try_from(self.log_capacity).unwrap_or(i64::MAX);
        let entry_json = serde_json::to_string(&entry)
            .map_err(|err| HealthHookError::from(InfraError::from(err)))?;

        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            tx.execute(
                "INSERT INTO delivery_log (entry_json, created_at) VALUES (?1, ?2)",
                params![entry_json, Utc::now().timestamp()],
            )
            .map_err(map_sql_error)?;
            tx.execute(
                "DELETE FROM delivery_log WHERE seq NOT IN
                    (SELECT seq FROM delivery_log ORDER BY seq DESC LIMIT ?1)",
                params![capacity],
            )
            .map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delivery_logs(&self) -> DomainResult<Vec<DeliveryLogEntry>> {
        let db = Arc::clone(&self.db);
        let capacity = i64::try_from(self.log_capacity).unwrap_or(i64::MAX);

        let rows = task::spawn_blocking(move || -> DomainResult<Vec<String>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare("SELECT entry_json FROM delivery_log ORDER BY seq DESC LIMIT ?1")
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![capacity], |row| row.get::<_, String>(0))
                .map_err(map_sql_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_sql_error)?;
            Ok(rows)
        })
        .await
        .map_err(map_join_error)??;

        Ok(rows
            .iter()
            .filter_map(|raw| match serde_json::from_str(raw) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "skipping undecodable delivery log row");
                    None
                }
            })
            .collect())
    }

    async fn clear_delivery_logs(&self) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM delivery_log", []).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

fn checkpoint_key(metric: MetricType) -> String {
    format!("{CHECKPOINT_PREFIX}{}", metric.key())
}

/// Current JSON list, a JSON string of comma-separated URLs, or the raw
/// comma-separated text older versions wrote.
fn decode_endpoints(raw: &str) -> Vec<WebhookEndpoint> {
    if let Ok(endpoints) = serde_json::from_str::<Vec<WebhookEndpoint>>(raw) {
        return endpoints;
    }
    if let Ok(urls) = serde_json::from_str::<String>(raw) {
        return parse_legacy_urls(&urls);
    }
    if raw.contains("://") && !raw.trim_start().starts_with('[') {
        return parse_legacy_urls(raw);
    }
    warn!("stored webhook endpoints do not decode, using empty list");
    Vec::new()
}

fn parse_legacy_urls(list: &str) -> Vec<WebhookEndpoint> {
    list.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(WebhookEndpoint::from_url)
        .collect()
}

fn map_join_error(err: task::JoinError) -> HealthHookError {
    HealthHookError::from(InfraError::from(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_comma_list_becomes_url_only_endpoints() {
        let endpoints = decode_endpoints("https://a.example.com/hook, https://b.example.com/hook,");
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[1].url, "https://b.example.com/hook");
        assert_eq!(endpoints[1].header_count(), 0);

        let quoted = decode_endpoints(r#""https://a.example.com/hook""#);
        assert_eq!(quoted, vec![WebhookEndpoint::from_url("https://a.example.com/hook")]);
    }

    #[test]
    fn garbage_endpoints_degrade_to_empty() {
        assert!(decode_endpoints("[{\"broken\"").is_empty());
        assert!(decode_endpoints("{}").is_empty());
    }

    #[test]
    fn checkpoint_keys_are_per_type() {
        assert_eq!(checkpoint_key(MetricType::HeartRate), "checkpoint.heart_rate");
        assert_ne!(checkpoint_key(MetricType::Steps), checkpoint_key(MetricType::Sleep));
    }
}
