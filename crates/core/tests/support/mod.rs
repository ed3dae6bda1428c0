//! Shared test helpers for `healthhook-core` integration tests.
//!
//! In-memory implementations of every core port, plus a harness that wires
//! them into a `SyncService` and `TriggerScheduler`.

#![allow(dead_code)]

pub mod backend;
pub mod mocks;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use healthhook_core::{DeliveryEngine, RetryPolicy, SyncService, TriggerScheduler};
use serde_json::json;

pub use backend::ManualBackend;
use healthhook_domain::MetricRecord;
pub use mocks::{FixedClock, MemoryStore, MockSource, MockTransport};

/// Everything a sync or scheduler test needs, backed by in-memory mocks.
pub struct Harness {
    pub source: Arc<MockSource>,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<MockTransport>,
    pub clock: Arc<FixedClock>,
    pub backend: Arc<ManualBackend>,
    pub sync: Arc<SyncService>,
    pub scheduler: TriggerScheduler,
}

impl Harness {
    /// Harness with a 1 ms retry delay so failing deliveries stay fast.
    pub fn new() -> Self {
        Self::with_policy(RetryPolicy { max_attempts: 3, initial_delay: Duration::from_millis(1) })
    }

    pub fn with_policy(policy: RetryPolicy) -> Self {
        let source = Arc::new(MockSource::new());
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(MockTransport::new());
        let clock = Arc::new(FixedClock::new(local(2026, 5, 4, 10, 0)));
        let backend = Arc::new(ManualBackend::new());

        let delivery =
            Arc::new(DeliveryEngine::new(transport.clone(), store.clone()).with_policy(policy));
        let sync = Arc::new(
            SyncService::new(source.clone(), store.clone(), delivery).with_clock(clock.clone()),
        );
        let scheduler = TriggerScheduler::with_clock(
            store.clone(),
            backend.clone(),
            sync.clone(),
            clock.clone(),
        );

        Self { source, store, transport, clock, backend, sync, scheduler }
    }
}

/// Local wall-clock instant; panics on times that do not exist locally.
pub fn local(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(year, month, day, hour, minute, 0).earliest().unwrap()
}

pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
}

/// Record at `at` with a single numeric `value` field.
pub fn record(at: DateTime<Utc>, value: i64) -> MetricRecord {
    MetricRecord::new(at, json!({ "value": value }))
}
