#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use healthhook_core::MetricSource;
use healthhook_domain::{
    EngineConfig, FirePrecision, MetricRecord, MetricType, SourceAvailability, SourceError,
};
use healthhook_infra::database::{DbManager, SqliteSettingsStore};
use serde_json::json;
use tempfile::TempDir;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    pub store: SqliteSettingsStore,
    temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a migrated database in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let manager = open(&temp_dir);
        let store = SqliteSettingsStore::new(Arc::clone(&manager));
        Self { manager, store, temp_dir }
    }

    /// Open a second manager on the same file, as a restarted process would.
    pub fn reopen(&self) -> SqliteSettingsStore {
        SqliteSettingsStore::new(open(&self.temp_dir))
    }

    /// Write a raw `settings` row, bypassing the store's encoding.
    pub fn put_raw_setting(&self, key: &str, value: &str) {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value_json, updated_at) VALUES (?1, ?2, 0)",
            rusqlite::params![key, value],
        )
        .expect("raw setting insert should succeed");
    }

    pub fn delivery_log_rows(&self) -> i64 {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.query_row("SELECT COUNT(*) FROM delivery_log", [], |row| row.get(0))
            .expect("count query should succeed")
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

fn open(temp_dir: &TempDir) -> Arc<DbManager> {
    let manager = DbManager::new(temp_dir.path().join("healthhook.db"), 4)
        .expect("db manager should be created");
    manager.run_migrations().expect("schema migrations should apply");
    Arc::new(manager)
}

/// Engine configuration pointing at a database inside `dir`.
pub fn engine_config(dir: &TempDir, precision: FirePrecision) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.database.path = dir.path().join("runtime.db").to_string_lossy().into_owned();
    config.http.timeout_secs = 2;
    config.scheduling.precision = precision;
    config
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).single().expect("valid timestamp")
}

/// In-memory metric source with every type granted.
#[derive(Default)]
pub struct StaticSource {
    records: Mutex<Vec<(MetricType, MetricRecord)>>,
    granted: Mutex<Option<BTreeSet<MetricType>>>,
}

impl StaticSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, metric: MetricType, at: DateTime<Utc>, value: i64) {
        let record = MetricRecord::new(at, json!({ "value": value }));
        self.records.lock().unwrap().push((metric, record));
    }

    pub fn grant_only(&self, types: &[MetricType]) {
        *self.granted.lock().unwrap() = Some(types.iter().copied().collect());
    }
}

#[async_trait]
impl MetricSource for StaticSource {
    async fn availability(&self) -> SourceAvailability {
        SourceAvailability::Available
    }

    async fn granted_capabilities(&self) -> BTreeSet<MetricType> {
        self.granted
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| MetricType::ALL.into_iter().collect())
    }

    async fn fetch_records(
        &self,
        metric: MetricType,
        since: DateTime<Utc>,
    ) -> Result<Vec<MetricRecord>, SourceError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, r)| *m == metric && r.recorded_at > since)
            .map(|(_, r)| r.clone())
            .collect())
    }
}
